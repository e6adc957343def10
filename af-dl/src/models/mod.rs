//! Data models for af-dl
//!
//! - Download job submitted by the user
//! - Per-job progress record

pub mod job;
pub mod progress;

pub use job::{AudioQuality, DownloadJob};
pub use progress::{DownloadStatus, ProgressRecord};
