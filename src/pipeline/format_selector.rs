// FormatSelector - maps a requested format identifier to a stream role
//
// Classification is static: it never asks the downloader whether the
// identifier is offered by a given source. That is only discovered when
// the download runs.

use super::errors::{PipelineError, Result};
use super::models::{StreamRequest, StreamRole};

/// Identifiers delivered as audio-only m4a.
pub const AUDIO_FORMATS: &[&str] = &["139", "140", "141", "256", "258", "325", "328"];

/// Identifiers delivered as video-only mp4.
pub const VIDEO_FORMATS: &[&str] = &[
    "133", "134", "135", "136", "137", "138", "160", "212", "264", "266", "298", "299", "394",
    "395", "396", "397", "398", "399", "400", "401",
];

/// Preferred identifiers when none are given.
pub const DEFAULT_AUDIO_FORMAT: &str = "140";
pub const DEFAULT_VIDEO_FORMAT: &str = "137";

pub struct FormatSelector;

impl FormatSelector {
    /// Role and container extension for `format_id`.
    pub fn classify(format_id: &str) -> Result<(StreamRole, &'static str)> {
        let id = format_id.trim();

        let role = if AUDIO_FORMATS.contains(&id) {
            StreamRole::Audio
        } else if VIDEO_FORMATS.contains(&id) {
            StreamRole::Video
        } else {
            return Err(PipelineError::InvalidFormatIdentifier {
                id: format_id.to_string(),
                audio: AUDIO_FORMATS.join(", "),
                video: VIDEO_FORMATS.join(", "),
            });
        };

        Ok((role, role.extension()))
    }

    /// Build the download request for `format_id`.
    pub fn request(format_id: &str) -> Result<StreamRequest> {
        let (role, _) = Self::classify(format_id)?;
        Ok(StreamRequest::new(role, format_id.trim()))
    }

    /// Build a request and check it landed in the expected role.
    ///
    /// An audio identifier passed as the video override is as wrong as an
    /// unknown one, so it gets the same error.
    pub fn request_for(expected: StreamRole, format_id: &str) -> Result<StreamRequest> {
        let request = Self::request(format_id)?;
        if request.role != expected {
            return Err(PipelineError::InvalidFormatIdentifier {
                id: format!("{} (a {} identifier, expected {})", format_id, request.role, expected),
                audio: AUDIO_FORMATS.join(", "),
                video: VIDEO_FORMATS.join(", "),
            });
        }
        Ok(request)
    }
}
