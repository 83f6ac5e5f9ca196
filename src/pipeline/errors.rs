// Error types for the merge pipeline

use std::fmt;

use super::models::StreamRole;

/// Result type alias used across the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Why a single stream download failed.
#[derive(Debug, Clone)]
pub enum DownloadFailure {
    /// The source does not offer the requested identifier.
    /// Carries the filtered format table the downloader printed for this source.
    FormatUnavailable {
        role: StreamRole,
        format_id: String,
        listing: String,
    },

    /// Any other non-zero exit (or the tool could not be started).
    Other { role: StreamRole, stderr: String },
}

impl DownloadFailure {
    pub fn role(&self) -> StreamRole {
        match self {
            Self::FormatUnavailable { role, .. } | Self::Other { role, .. } => *role,
        }
    }
}

impl fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FormatUnavailable {
                role, format_id, ..
            } => write!(
                f,
                "format {} is not available for the {} stream of this source",
                format_id, role
            ),
            Self::Other { role, stderr } => {
                write!(f, "{} download failed: {}", role, stderr.trim())
            }
        }
    }
}

/// Every fatal condition the pipeline can hit.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The runtime reported an operating system we have no tool table for.
    #[error("unsupported platform: {os}")]
    UnsupportedPlatform { os: String },

    /// Fetching the downloader binary returned a non-success response.
    #[error("failed to fetch {url}: {reason}")]
    DownloadFetch { url: String, reason: String },

    /// The tool cannot be installed automatically on this host.
    #[error("{tool} must be installed manually.\n{guidance}")]
    ManualInstallRequired { tool: String, guidance: String },

    /// The identifier is in neither known set.
    #[error(
        "invalid format identifier '{id}'. Valid audio identifiers: {audio}. Valid video identifiers: {video}"
    )]
    InvalidFormatIdentifier {
        id: String,
        audio: String,
        video: String,
    },

    #[error("{0}")]
    Download(DownloadFailure),

    /// The transcoder exited non-zero.
    #[error("merge failed: {stderr}")]
    MergeFailure { stderr: String },

    /// A package manager command exited non-zero while installing a tool.
    #[error("`{command}` failed with exit code {code:?}")]
    PackageInstall { command: String, code: Option<i32> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PipelineError {
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DownloadFetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn manual_install(tool: impl Into<String>, guidance: impl Into<String>) -> Self {
        Self::ManualInstallRequired {
            tool: tool.into(),
            guidance: guidance.into(),
        }
    }

    /// Format table to print before the error line, if this failure carries one.
    pub fn format_listing(&self) -> Option<&str> {
        match self {
            Self::Download(DownloadFailure::FormatUnavailable { listing, .. }) => {
                Some(listing.as_str())
            }
            _ => None,
        }
    }

    /// Process exit code for this failure. Every pipeline error is fatal.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

impl From<DownloadFailure> for PipelineError {
    fn from(failure: DownloadFailure) -> Self {
        Self::Download(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_unavailable_exposes_listing() {
        let err = PipelineError::from(DownloadFailure::FormatUnavailable {
            role: StreamRole::Video,
            format_id: "401".to_string(),
            listing: "ID EXT\n137 mp4".to_string(),
        });

        assert_eq!(err.format_listing(), Some("ID EXT\n137 mp4"));
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("video"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn failure_reports_its_stream_role() {
        let unavailable = DownloadFailure::FormatUnavailable {
            role: StreamRole::Video,
            format_id: "401".to_string(),
            listing: String::new(),
        };
        let other = DownloadFailure::Other {
            role: StreamRole::Audio,
            stderr: String::new(),
        };

        assert_eq!(unavailable.role(), StreamRole::Video);
        assert_eq!(other.role(), StreamRole::Audio);
    }

    #[test]
    fn other_failure_has_no_listing() {
        let err = PipelineError::from(DownloadFailure::Other {
            role: StreamRole::Audio,
            stderr: "ERROR: Unable to download webpage\n".to_string(),
        });

        assert!(err.format_listing().is_none());
        assert_eq!(
            err.to_string(),
            "audio download failed: ERROR: Unable to download webpage"
        );
    }
}
