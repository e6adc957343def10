//! Media extraction engine abstraction
//!
//! The pipeline drives an external extraction + transcode engine through the
//! `MediaEngine` trait. Requests are declarative: the pipeline states what it
//! wants (format, naming, thumbnail, post-processing chain) and the engine
//! decides how to get there.

pub mod ytdlp;

pub use ytdlp::YtDlpEngine;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Engine failure
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine process could not be started
    #[error("Failed to start {engine}: {source}")]
    Spawn {
        engine: String,
        #[source]
        source: std::io::Error,
    },

    /// Engine ran but reported failure
    #[error("{engine} failed (exit code {code:?}): {message}")]
    Failed {
        engine: String,
        code: Option<i32>,
        message: String,
    },

    /// Engine output could not be understood
    #[error("Unexpected engine output: {0}")]
    Parse(String),

    /// Engine exceeded the configured time limit
    #[error("Engine timed out after {0} seconds")]
    Timeout(u64),

    /// I/O while talking to the engine
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Post-processing stage, applied in list order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// Transcode to `codec` at `bitrate_kbps`
    ExtractAudio { codec: String, bitrate_kbps: u32 },
    /// Copy source metadata (title/uploader) into container tags
    EmbedMetadata,
    /// Embed the fetched thumbnail as cover art
    EmbedThumbnail,
}

/// What to fetch and how to post-process it
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub url: String,
    /// Flat directory receiving the output
    pub output_dir: PathBuf,
    /// Naming scheme relative to `output_dir`, e.g. `%(title)s.%(ext)s`
    pub output_template: String,
    /// Stream selector, e.g. `bestaudio/best`
    pub format: String,
    pub write_thumbnail: bool,
    /// Resolve a single item even when the URL also names a collection
    pub no_playlist: bool,
    pub postprocessors: Vec<PostProcessor>,
}

impl EngineRequest {
    /// Best available audio, title-derived names, thumbnail, then
    /// transcode → embed metadata → embed thumbnail
    pub fn audio(url: impl Into<String>, output_dir: impl Into<PathBuf>, codec: &str, bitrate_kbps: u32) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            output_template: "%(title)s.%(ext)s".to_string(),
            format: "bestaudio/best".to_string(),
            write_thumbnail: true,
            no_playlist: true,
            postprocessors: vec![
                PostProcessor::ExtractAudio {
                    codec: codec.to_string(),
                    bitrate_kbps,
                },
                PostProcessor::EmbedMetadata,
                PostProcessor::EmbedThumbnail,
            ],
        }
    }
}

/// Result of an extraction
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub uploader: Option<String>,
    /// Output path the naming scheme resolved to (pre-transcode extension)
    pub prepared_filename: PathBuf,
    /// `Some(n)` when the URL resolved to a collection of `n` items
    pub entry_count: Option<usize>,
}

impl MediaInfo {
    pub fn is_collection(&self) -> bool {
        self.entry_count.is_some()
    }
}

/// Phase reported by a progress tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Downloading,
    Finished,
    Other,
}

/// Raw progress report from the engine
///
/// Values are passed through as the engine formats them; interpretation
/// belongs to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressTick {
    pub status: TickStatus,
    /// Precomputed percentage, e.g. `" 42.3%"` or `"NA"`
    pub percent_str: Option<String>,
    pub downloaded_bytes_str: Option<String>,
    pub total_bytes_str: Option<String>,
}

/// Synchronous progress callback, invoked on the engine's execution context
pub type ProgressCallback<'a> = &'a (dyn Fn(&ProgressTick) + Send + Sync);

/// External extraction + transcode engine
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Resolve, fetch and post-process `request.url`
    ///
    /// Collections are reported through `MediaInfo::entry_count` without
    /// downloading anything.
    async fn fetch(
        &self,
        request: &EngineRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<MediaInfo, EngineError>;
}
