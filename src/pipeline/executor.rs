// DownloadExecutor - fetches one stream with yt-dlp and classifies the outcome

use regex::Regex;
use std::sync::Arc;

use super::errors::DownloadFailure;
use super::models::{
    DownloadOutcome, DownloadResult, HostEnvironment, StreamRequest, ToolInvocation,
};
use super::traits::{CommandRunner, CommandSpec};
use super::utils::proxy_args;

/// yt-dlp's wording when the source doesn't offer the requested identifier.
///
/// Tied to the tool's current phrasing; if yt-dlp rewords this message the
/// failure is reported as a generic one instead.
pub const FORMAT_UNAVAILABLE_MARKER: &str = "Requested format is not available";

lazy_static::lazy_static! {
    /// Log lines yt-dlp prints ahead of the format table: `[youtube] ...`, `[info] ...`, warnings.
    static ref LISTING_NOISE_RE: Regex =
        Regex::new(r"^\s*(\[[^\]]+\]|WARNING:|ERROR:|Deprecated Feature:)").unwrap();
}

/// Classify a failed invocation by its error text.
pub fn classify_failure(stderr: &str) -> DownloadOutcome {
    if stderr.contains(FORMAT_UNAVAILABLE_MARKER) {
        DownloadOutcome::FormatUnavailable
    } else {
        DownloadOutcome::OtherFailure
    }
}

/// Keep only the format table from `-F` output.
pub fn filter_format_listing(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !LISTING_NOISE_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct DownloadExecutor {
    runner: Arc<dyn CommandRunner>,
    proxy: Option<String>,
}

impl DownloadExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            proxy: None,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    fn base_command(&self, tool: &ToolInvocation) -> CommandSpec {
        CommandSpec::new(tool.program()).args(proxy_args(self.proxy.as_deref()))
    }

    /// `<tool> -f <id> <url> -o <output>`
    pub fn download_command(
        &self,
        tool: &ToolInvocation,
        source_url: &str,
        request: &StreamRequest,
    ) -> CommandSpec {
        self.base_command(tool)
            .arg("-f")
            .arg(&request.format_id)
            .arg(source_url)
            .arg("-o")
            .arg(&request.output_filename)
    }

    /// `<tool> -F <url>`
    pub fn listing_command(&self, tool: &ToolInvocation, source_url: &str) -> CommandSpec {
        self.base_command(tool).arg("-F").arg(source_url)
    }

    /// Download one stream into the working directory.
    ///
    /// Never retries. On a format-unavailable failure the downloader is run
    /// once more in listing mode so the caller can show what the source offers.
    pub async fn download(
        &self,
        source_url: &str,
        request: &StreamRequest,
        tool: &ToolInvocation,
        env: &HostEnvironment,
    ) -> DownloadResult {
        let cmd = self.download_command(tool, source_url, request);
        tracing::info!(
            role = %request.role,
            format = %request.format_id,
            output = %request.output_filename,
            "downloading stream"
        );

        let (exit_status, stdout, stderr) = match self.runner.run(&cmd, env).await {
            Ok(out) => (out.code, out.stdout, out.stderr),
            Err(e) => (None, String::new(), format!("failed to start {}: {}", tool.program(), e)),
        };

        let outcome = if exit_status == Some(0) {
            DownloadOutcome::Success
        } else {
            classify_failure(&stderr)
        };

        let format_listing = match outcome {
            DownloadOutcome::FormatUnavailable => {
                Some(self.list_formats(source_url, tool, env).await)
            }
            _ => None,
        };

        match outcome {
            DownloadOutcome::Success => {
                tracing::info!(role = %request.role, "stream downloaded")
            }
            DownloadOutcome::FormatUnavailable => {
                tracing::warn!(
                    role = %request.role,
                    format = %request.format_id,
                    "format not offered by source"
                )
            }
            DownloadOutcome::OtherFailure => {
                tracing::warn!(role = %request.role, code = ?exit_status, "stream download failed")
            }
        }

        DownloadResult {
            request: request.clone(),
            exit_status,
            stdout,
            stderr,
            outcome,
            format_listing,
        }
    }

    /// Filtered format table for `source_url`. Failures come back as text to show.
    pub async fn list_formats(
        &self,
        source_url: &str,
        tool: &ToolInvocation,
        env: &HostEnvironment,
    ) -> String {
        let cmd = self.listing_command(tool, source_url);
        match self.runner.run(&cmd, env).await {
            Ok(out) => {
                let table = filter_format_listing(&out.stdout);
                if table.is_empty() {
                    format!("(no formats listed)\n{}", out.stderr.trim())
                } else {
                    table
                }
            }
            Err(e) => format!("(could not list formats: {})", e),
        }
    }
}

impl DownloadResult {
    /// `Ok` on success, otherwise the failure to abort the run with.
    pub fn into_result(self) -> Result<StreamRequest, DownloadFailure> {
        match self.outcome {
            DownloadOutcome::Success => Ok(self.request),
            DownloadOutcome::FormatUnavailable => Err(DownloadFailure::FormatUnavailable {
                role: self.request.role,
                format_id: self.request.format_id,
                listing: self.format_listing.unwrap_or_default(),
            }),
            DownloadOutcome::OtherFailure => Err(DownloadFailure::Other {
                role: self.request.role,
                stderr: self.stderr,
            }),
        }
    }
}
