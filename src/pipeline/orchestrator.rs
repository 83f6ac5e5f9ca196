// Orchestrator - runs the stages in order and always cleans up afterwards

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use super::cleanup::CleanupManager;
use super::errors::{PipelineError, Result};
use super::executor::DownloadExecutor;
use super::format_selector::FormatSelector;
use super::merge::MergePipeline;
use super::models::{CleanupReport, HostEnvironment, StreamRequest, StreamRole, ToolInvocation};
use super::tools::{DownloaderProbe, ReleaseSource, ToolResolver, ToolType, TranscoderProbe};
use super::traits::{BinaryFetcher, CommandRunner, ToolProbe};

/// What to fetch and from where.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub source_url: String,
    pub audio_format: String,
    pub video_format: String,
}

/// Outcome of a whole run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub output: Option<PathBuf>,
    pub error: Option<String>,
    /// Filtered format table when the failure was an unavailable format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_listing: Option<String>,
    pub cleanup: CleanupReport,
    pub exit_code: u8,
}

impl RunSummary {
    fn new(result: Result<PathBuf>, cleanup: CleanupReport) -> Self {
        match result {
            Ok(output) => Self {
                output: Some(output),
                error: None,
                format_listing: None,
                cleanup,
                exit_code: 0,
            },
            Err(e) => Self {
                output: None,
                error: Some(e.to_string()),
                format_listing: e.format_listing().map(str::to_string),
                exit_code: e.exit_code(),
                cleanup,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

pub struct Orchestrator {
    resolver: ToolResolver,
    downloader_probe: Box<dyn ToolProbe>,
    transcoder_probe: Box<dyn ToolProbe>,
    executor: DownloadExecutor,
    merger: MergePipeline,
    cleanup: CleanupManager,
}

impl Orchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        fetcher: Arc<dyn BinaryFetcher>,
        release: ReleaseSource,
    ) -> Self {
        Self {
            resolver: ToolResolver::new(runner.clone(), fetcher, release),
            downloader_probe: Box::new(DownloaderProbe::new(runner.clone())),
            transcoder_probe: Box::new(TranscoderProbe::new(runner.clone())),
            executor: DownloadExecutor::new(runner.clone()),
            merger: MergePipeline::new(runner),
            cleanup: CleanupManager::new(),
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.executor = self.executor.with_proxy(proxy.clone());
        self.merger = self.merger.with_proxy(proxy);
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.merger = self.merger.with_overwrite(overwrite);
        self
    }

    pub fn with_resolver(mut self, resolver: ToolResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Run every stage, then clean up the temp artifacts whatever happened.
    pub async fn run(&self, request: &RunRequest, env: HostEnvironment) -> RunSummary {
        let temp_files: Vec<PathBuf> = [StreamRole::Audio, StreamRole::Video]
            .iter()
            .map(|role| env.working_dir.join(role.temp_filename()))
            .collect();

        let result = self.run_stages(request, env).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "pipeline aborted");
        }

        let cleanup = self.cleanup.cleanup(&temp_files).await;
        RunSummary::new(result, cleanup)
    }

    async fn run_stages(&self, request: &RunRequest, env: HostEnvironment) -> Result<PathBuf> {
        let downloader = self
            .resolver
            .ensure_available(ToolType::Downloader, self.downloader_probe.as_ref(), env)
            .await?;
        let transcoder = self
            .resolver
            .ensure_available(ToolType::Transcoder, self.transcoder_probe.as_ref(), downloader.env)
            .await?;
        let env = transcoder.env;
        let (downloader, transcoder) = (downloader.invocation, transcoder.invocation);
        tracing::info!(downloader = %downloader, transcoder = %transcoder, "tools ready");

        let audio = FormatSelector::request_for(StreamRole::Audio, &request.audio_format)?;
        let video = FormatSelector::request_for(StreamRole::Video, &request.video_format)?;

        for stream in [&audio, &video] {
            self.fetch_stream(&request.source_url, stream, &downloader, &env)
                .await?;
        }

        self.merger
            .merge_and_finalize(&request.source_url, &audio, &video, &downloader, &transcoder, &env)
            .await
    }

    async fn fetch_stream(
        &self,
        source_url: &str,
        stream: &StreamRequest,
        downloader: &ToolInvocation,
        env: &HostEnvironment,
    ) -> Result<()> {
        self.executor
            .download(source_url, stream, downloader, env)
            .await
            .into_result()
            .map(|_| ())
            .map_err(|failure| {
                tracing::warn!(role = %failure.role(), "stopping after failed stream download");
                PipelineError::from(failure)
            })
    }
}
