// MergePipeline - derives the output title and muxes the two streams with ffmpeg

use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;

use super::errors::{PipelineError, Result};
use super::models::{HostEnvironment, MergeJob, StreamRequest, ToolInvocation};
use super::traits::{CommandRunner, CommandSpec};
use super::utils::proxy_args;

lazy_static::lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Used when the downloader printed nothing at all.
const FALLBACK_TITLE: &str = "merged";

/// Turn printed filename text into a title: drop the extension at the last
/// period, turn whitespace runs into underscores.
///
/// Path separators are replaced too so the result always names a file
/// inside the working directory.
pub fn normalize_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let stem = match trimmed.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => trimmed,
    };

    let title = WHITESPACE_RE
        .replace_all(stem.trim(), "_")
        .replace(['/', '\\'], "_");

    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

pub struct MergePipeline {
    runner: Arc<dyn CommandRunner>,
    proxy: Option<String>,
    overwrite: bool,
}

impl MergePipeline {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            proxy: None,
            overwrite: false,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Replace an existing output file instead of failing.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Ask the downloader which filename it would use and derive a title from it.
    ///
    /// If that invocation fails, its error text is used instead.
    pub async fn derive_title(
        &self,
        source_url: &str,
        downloader: &ToolInvocation,
        env: &HostEnvironment,
    ) -> String {
        let cmd = CommandSpec::new(downloader.program())
            .args(proxy_args(self.proxy.as_deref()))
            .args(["--print", "filename", source_url]);

        let raw = match self.runner.run(&cmd, env).await {
            Ok(out) if out.success() => out.stdout,
            Ok(out) => {
                tracing::warn!(
                    code = ?out.code,
                    "filename lookup failed, deriving title from error text"
                );
                out.stderr
            }
            Err(e) => {
                tracing::warn!(error = %e, "filename lookup could not start");
                e.to_string()
            }
        };

        let title = normalize_title(&raw);
        tracing::debug!(title = %title, "derived output title");
        title
    }

    /// `<tool> -i <video> -i <audio> -c:v copy -c:a aac -strict experimental <out>`
    pub fn merge_command(&self, job: &MergeJob, transcoder: &ToolInvocation) -> CommandSpec {
        let cmd = CommandSpec::new(transcoder.program());
        let cmd = if self.overwrite { cmd.arg("-y") } else { cmd };

        cmd.arg("-i")
            .arg(job.video_file.to_string_lossy())
            .arg("-i")
            .arg(job.audio_file.to_string_lossy())
            .args(["-c:v", "copy", "-c:a", "aac", "-strict", "experimental"])
            .arg(job.output_file.to_string_lossy())
    }

    /// Run the transcoder. A partially written output is left in place on failure.
    pub async fn merge(
        &self,
        job: &MergeJob,
        transcoder: &ToolInvocation,
        env: &HostEnvironment,
    ) -> Result<PathBuf> {
        let cmd = self.merge_command(job, transcoder);
        tracing::info!(output = %job.output_file.display(), "merging streams");

        let output = self.runner.run(&cmd, env).await.map_err(|e| PipelineError::MergeFailure {
            stderr: format!("failed to start {}: {}", transcoder.program(), e),
        })?;

        if !output.success() {
            tracing::warn!(code = ?output.code, "transcoder failed");
            return Err(PipelineError::MergeFailure {
                stderr: output.stderr.trim().to_string(),
            });
        }

        tracing::info!(output = %job.output_file.display(), "merge complete");
        Ok(job.output_file.clone())
    }

    /// Derive the title, then merge the two downloaded streams into `<title>.mp4`.
    pub async fn merge_and_finalize(
        &self,
        source_url: &str,
        audio: &StreamRequest,
        video: &StreamRequest,
        downloader: &ToolInvocation,
        transcoder: &ToolInvocation,
        env: &HostEnvironment,
    ) -> Result<PathBuf> {
        let title = self.derive_title(source_url, downloader, env).await;
        let job = MergeJob::new(&env.working_dir, audio, video, title);
        self.merge(&job, transcoder, env).await
    }
}
