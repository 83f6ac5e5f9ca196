// Merge pipeline: tool provisioning, stream downloads, ffmpeg merge, cleanup

pub mod cleanup;
pub mod errors;
pub mod executor;
pub mod format_selector;
pub mod merge;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod tools;
pub mod traits;
pub mod utils;

pub use cleanup::CleanupManager;
pub use errors::{DownloadFailure, PipelineError, Result};
pub use executor::DownloadExecutor;
pub use format_selector::FormatSelector;
pub use merge::MergePipeline;
pub use models::{
    CleanupReport, CleanupStatus, DownloadOutcome, DownloadResult, HostEnvironment, MergeJob,
    StreamRequest, StreamRole, ToolInvocation,
};
pub use orchestrator::{Orchestrator, RunRequest, RunSummary};
pub use platform::{DistroFamily, Platform};
pub use tools::{ReleaseSource, ToolResolver, ToolType};
pub use traits::{BinaryFetcher, CommandRunner, CommandSpec, ProcessOutput, ToolProbe};
pub use utils::{HttpFetcher, SystemRunner};
