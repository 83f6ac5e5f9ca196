use clap::Parser;
use std::path::PathBuf;

use crate::config::{DEFAULT_RELEASE_URL, DEFAULT_RELEASE_VERSION};
use crate::pipeline::format_selector::{DEFAULT_AUDIO_FORMAT, DEFAULT_VIDEO_FORMAT};

#[derive(Parser, Debug)]
#[command(name = "yt-merge")]
#[command(
    author,
    version,
    about = "Download audio and video streams separately and merge them with ffmpeg"
)]
pub struct Cli {
    /// Source video URL
    pub url: String,

    /// Audio format identifier
    #[arg(short, long, default_value = DEFAULT_AUDIO_FORMAT)]
    pub audio: String,

    /// Video format identifier
    #[arg(short = 'v', long, default_value = DEFAULT_VIDEO_FORMAT)]
    pub video: String,

    /// Directory for temp streams, the downloaded yt-dlp binary and the output
    #[arg(short = 'C', long)]
    pub workdir: Option<PathBuf>,

    /// Proxy for yt-dlp and for fetching it (e.g. socks5://127.0.0.1:1080)
    #[arg(long, env = "YT_MERGE_PROXY")]
    pub proxy: Option<String>,

    /// Base URL yt-dlp release assets are fetched from
    #[arg(long, env = "YT_MERGE_RELEASE_URL", default_value = DEFAULT_RELEASE_URL)]
    pub release_url: String,

    /// yt-dlp release to fetch when it is not installed
    #[arg(long, env = "YT_MERGE_RELEASE_VERSION", default_value = DEFAULT_RELEASE_VERSION)]
    pub release_version: String,

    /// Replace an existing output file
    #[arg(long)]
    pub overwrite: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,
}
