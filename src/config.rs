// Run configuration assembled from the command line and environment

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::pipeline::format_selector::{DEFAULT_AUDIO_FORMAT, DEFAULT_VIDEO_FORMAT};
use crate::pipeline::{ReleaseSource, RunRequest};

pub const DEFAULT_RELEASE_URL: &str = "https://github.com/yt-dlp/yt-dlp/releases/download";
pub const DEFAULT_RELEASE_VERSION: &str = "2024.08.06";

#[derive(Debug, Clone)]
pub struct Config {
    pub source_url: String,
    pub audio_format: String,
    pub video_format: String,
    /// Absolute working directory.
    pub workdir: PathBuf,
    pub proxy: Option<String>,
    pub release_url: String,
    pub release_version: String,
    pub overwrite: bool,
}

impl Config {
    pub fn new(source_url: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            audio_format: DEFAULT_AUDIO_FORMAT.to_string(),
            video_format: DEFAULT_VIDEO_FORMAT.to_string(),
            workdir: workdir.into(),
            proxy: None,
            release_url: DEFAULT_RELEASE_URL.to_string(),
            release_version: DEFAULT_RELEASE_VERSION.to_string(),
            overwrite: false,
        }
    }

    pub fn from_cli(cli: &Cli) -> std::io::Result<Self> {
        let cwd = std::env::current_dir()?;
        let workdir = absolute(&cwd, cli.workdir.as_deref());

        Ok(Self::new(cli.url.clone(), workdir)
            .with_formats(cli.audio.clone(), cli.video.clone())
            .with_proxy(cli.proxy.clone())
            .with_release(cli.release_url.clone(), cli.release_version.clone())
            .with_overwrite(cli.overwrite))
    }

    pub fn with_formats(mut self, audio: impl Into<String>, video: impl Into<String>) -> Self {
        self.audio_format = audio.into();
        self.video_format = video.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_release(mut self, url: impl Into<String>, version: impl Into<String>) -> Self {
        self.release_url = url.into();
        self.release_version = version.into();
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn release(&self) -> ReleaseSource {
        ReleaseSource::new(&self.release_url, &self.release_version)
    }

    pub fn run_request(&self) -> RunRequest {
        RunRequest {
            source_url: self.source_url.clone(),
            audio_format: self.audio_format.clone(),
            video_format: self.video_format.clone(),
        }
    }
}

fn absolute(cwd: &Path, dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd.to_path_buf(),
    }
}
