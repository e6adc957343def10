//! Progress record for a single download

use serde::{Deserialize, Serialize};

pub use af_common::events::DownloadStatus;

/// Snapshot of one download's progress
///
/// `progress` is a percentage (0.0 - 100.0), meaningful while downloading and
/// as the terminal value at completion. `filename` is set only on completion,
/// `error` only on failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub status: DownloadStatus,
    pub progress: f64,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl ProgressRecord {
    /// Fresh idle record
    pub fn idle() -> Self {
        Self::default()
    }
}
