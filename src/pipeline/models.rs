// Data models shared by the pipeline stages

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use super::errors::Result;
use super::platform::Platform;

/// Which half of the final file a download provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRole {
    Audio,
    Video,
}

impl StreamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Container extension the stream is written with.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Audio => "m4a",
            Self::Video => "mp4",
        }
    }

    /// Temp artifact name for this role, e.g. `my_audio.m4a`.
    pub fn temp_filename(&self) -> String {
        format!("my_{}.{}", self.as_str(), self.extension())
    }
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stream to fetch: a validated identifier plus where it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub role: StreamRole,
    pub format_id: String,
    pub extension: &'static str,
    pub output_filename: String,
}

impl StreamRequest {
    pub fn new(role: StreamRole, format_id: impl Into<String>) -> Self {
        Self {
            role,
            format_id: format_id.into(),
            extension: role.extension(),
            output_filename: role.temp_filename(),
        }
    }

    pub fn output_path(&self, working_dir: &Path) -> PathBuf {
        working_dir.join(&self.output_filename)
    }
}

/// Classification of a finished downloader invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success,
    FormatUnavailable,
    OtherFailure,
}

/// Everything captured from one downloader invocation.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub request: StreamRequest,
    /// `None` when the process could not be started or was killed by a signal.
    pub exit_status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub outcome: DownloadOutcome,
    /// Filtered `-F` table, only filled for `FormatUnavailable`.
    pub format_listing: Option<String>,
}

/// Inputs of the final transcoder invocation.
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub audio_file: PathBuf,
    pub video_file: PathBuf,
    pub derived_title: String,
    pub output_file: PathBuf,
}

impl MergeJob {
    pub fn new(
        working_dir: &Path,
        audio: &StreamRequest,
        video: &StreamRequest,
        title: String,
    ) -> Self {
        Self {
            audio_file: audio.output_path(working_dir),
            video_file: video.output_path(working_dir),
            output_file: working_dir.join(format!("{}.mp4", title)),
            derived_title: title,
        }
    }
}

/// Result of one removal attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum CleanupStatus {
    Removed,
    NotFound,
    Errored(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupEntry {
    pub path: PathBuf,
    pub status: CleanupStatus,
}

/// Aggregate of one cleanup pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub removed_count: usize,
    pub not_found_count: usize,
    pub error_count: usize,
    pub entries: Vec<CleanupEntry>,
}

impl CleanupReport {
    pub fn record(&mut self, path: PathBuf, status: CleanupStatus) {
        match status {
            CleanupStatus::Removed => self.removed_count += 1,
            CleanupStatus::NotFound => self.not_found_count += 1,
            CleanupStatus::Errored(_) => self.error_count += 1,
        }
        self.entries.push(CleanupEntry { path, status });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cleanup: {} removed, {} not found, {} errors",
            self.removed_count, self.not_found_count, self.error_count
        )
    }
}

/// The process environment the pipeline runs against.
///
/// Passed into and returned from the tool resolver instead of mutating the
/// real process environment; child processes get `search_path` as their `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub platform: Platform,
    pub search_path: Vec<PathBuf>,
    pub working_dir: PathBuf,
}

impl HostEnvironment {
    pub fn new(
        platform: Platform,
        search_path: Vec<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            platform,
            search_path,
            working_dir: working_dir.into(),
        }
    }

    /// Read the platform and `PATH` of the running process.
    pub fn from_process(working_dir: impl Into<PathBuf>) -> Result<Self> {
        let platform = Platform::current()?;
        let search_path = std::env::var_os("PATH")
            .map(|raw| std::env::split_paths(&raw).collect())
            .unwrap_or_default();
        Ok(Self::new(platform, search_path, working_dir))
    }

    pub fn contains_dir(&self, dir: &Path) -> bool {
        self.search_path.iter().any(|p| p == dir)
    }

    /// Put `dir` at the front of the search path unless it is already there.
    /// Returns whether anything changed.
    pub fn prepend_dir(&mut self, dir: &Path) -> bool {
        if self.contains_dir(dir) {
            return false;
        }
        self.search_path.insert(0, dir.to_path_buf());
        true
    }

    /// `PATH` value for child processes, joined with the platform separator.
    pub fn search_path_value(&self) -> OsString {
        let mut value = OsString::new();
        for (idx, dir) in self.search_path.iter().enumerate() {
            if idx > 0 {
                value.push(self.platform.path_separator().to_string());
            }
            value.push(dir.as_os_str());
        }
        value
    }
}

/// How to invoke a resolved tool for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    /// Found on the existing search path or installed by a package manager.
    SystemWide(String),
    /// Placed in the working directory by this or an earlier run.
    Local(String),
}

impl ToolInvocation {
    pub fn program(&self) -> &str {
        match self {
            Self::SystemWide(name) | Self::Local(name) => name,
        }
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemWide(name) => write!(f, "{} (system)", name),
            Self::Local(name) => write!(f, "{} (local)", name),
        }
    }
}
