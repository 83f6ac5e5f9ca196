// CleanupManager - removes per-run temp artifacts

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::models::{CleanupReport, CleanupStatus};

#[derive(Debug, Default, Clone)]
pub struct CleanupManager;

impl CleanupManager {
    pub fn new() -> Self {
        Self
    }

    /// Try to remove every path. Never fails: problems are recorded in the report.
    pub async fn cleanup<P: AsRef<Path>>(&self, paths: &[P]) -> CleanupReport {
        let mut report = CleanupReport::default();

        for path in paths {
            let path = path.as_ref();
            let status = Self::remove(path).await;
            if let CleanupStatus::Errored(reason) = &status {
                tracing::warn!(
                    path = %path.display(),
                    error = %reason,
                    "could not remove temp file"
                );
            }
            report.record(PathBuf::from(path), status);
        }

        tracing::info!(
            removed = report.removed_count,
            not_found = report.not_found_count,
            errors = report.error_count,
            "cleanup finished"
        );
        report
    }

    async fn remove(path: &Path) -> CleanupStatus {
        match tokio::fs::remove_file(path).await {
            Ok(()) => CleanupStatus::Removed,
            Err(e) if e.kind() == ErrorKind::NotFound => CleanupStatus::NotFound,
            Err(e) => CleanupStatus::Errored(e.to_string()),
        }
    }
}
