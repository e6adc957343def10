//! Single-URL download pipeline
//!
//! Drives one job from submission to a finished, tagged MP3:
//! engine fetch with live progress, collection rejection, output check,
//! best-effort ID3 tagging. Every outcome is mirrored into the job's
//! `ProgressStore`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::models::{DownloadJob, DownloadStatus};
use crate::services::engine::{EngineRequest, MediaEngine, MediaInfo, ProgressTick, TickStatus};
use crate::services::metadata_enhancer::MetadataEnhancer;
use crate::services::progress_store::ProgressStore;

/// Output codec requested from the engine
pub const TARGET_CODEC: &str = "mp3";

/// Percentage of a progress tick, in `0..=100`
///
/// Prefers the engine's own percent string; falls back to the byte counters
/// when it is missing or unparseable. Anything else reads as 0.
pub fn parse_percent(tick: &ProgressTick) -> f64 {
    let from_percent = tick
        .percent_str
        .as_deref()
        .and_then(|s| s.trim().trim_end_matches('%').trim().parse::<f64>().ok())
        .filter(|p| p.is_finite());

    let percent = from_percent
        .or_else(|| {
            let downloaded = parse_byte_count(tick.downloaded_bytes_str.as_deref()?)?;
            let total = parse_byte_count(tick.total_bytes_str.as_deref()?)?;
            (total > 0.0).then(|| downloaded / total * 100.0)
        })
        .unwrap_or(0.0);

    percent.clamp(0.0, 100.0)
}

fn parse_byte_count(value: &str) -> Option<f64> {
    value
        .trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
}

/// Engine + enhancer wired to an output directory
pub struct DownloadPipeline {
    engine: Arc<dyn MediaEngine>,
    output_dir: PathBuf,
    enhancer: MetadataEnhancer,
}

impl DownloadPipeline {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        output_dir: impl Into<PathBuf>,
        enhancer: MetadataEnhancer,
    ) -> Self {
        Self {
            engine,
            output_dir: output_dir.into(),
            enhancer,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Download `job.url` as MP3 at the job's bitrate
    ///
    /// Returns the produced file's basename. On failure the store ends in
    /// `error` with the message; on success in `complete` at 100.
    pub async fn run(&self, job: &DownloadJob, store: &ProgressStore) -> Result<String, DownloadError> {
        info!(
            job_id = %job.job_id,
            url = %job.url,
            quality_kbps = job.quality.kbps(),
            engine = self.engine.name(),
            "Starting download"
        );
        store.set(DownloadStatus::Downloading, Some(0.0), None, None);

        match self.execute(job, store).await {
            Ok(filename) => {
                store.set(
                    DownloadStatus::Complete,
                    Some(100.0),
                    Some(filename.clone()),
                    None,
                );
                info!(job_id = %job.job_id, file = %filename, "Download complete");
                Ok(filename)
            }
            Err(e) => {
                warn!(job_id = %job.job_id, code = e.code(), "Download failed: {}", e);
                store.set(DownloadStatus::Error, None, None, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &DownloadJob, store: &ProgressStore) -> Result<String, DownloadError> {
        let request = EngineRequest::audio(
            job.url.clone(),
            self.output_dir.clone(),
            TARGET_CODEC,
            job.quality.kbps(),
        );

        let on_progress = |tick: &ProgressTick| {
            if tick.status == TickStatus::Downloading {
                store.set(DownloadStatus::Downloading, Some(parse_percent(tick)), None, None);
            }
        };
        let info = self.engine.fetch(&request, &on_progress).await?;

        if let Some(entries) = info.entry_count {
            return Err(DownloadError::CollectionNotSupported { entries });
        }

        let expected = info.prepared_filename.with_extension(TARGET_CODEC);
        if !tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            warn!(job_id = %job.job_id, path = %expected.display(), "Expected output file is missing");
            return Err(DownloadError::OutputMissing(expected));
        }

        self.tag(&expected, &info).await;

        let filename = expected
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| DownloadError::OutputMissing(expected.clone()))?;
        Ok(filename)
    }

    /// Run the enhancer off the async runtime; failures only get logged
    async fn tag(&self, path: &Path, info: &MediaInfo) {
        let enhancer = self.enhancer.clone();
        let target = path.to_path_buf();
        let title = info.title.clone();
        let artist = info.uploader.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            enhancer.enhance(&target, title.as_deref(), artist.as_deref())
        })
        .await;

        match outcome {
            Ok(Ok(())) => debug!(file = %path.display(), "Metadata updated"),
            Ok(Err(e)) => warn!(file = %path.display(), "Could not update metadata: {}", e),
            Err(e) => warn!(file = %path.display(), "Metadata task aborted: {}", e),
        }
    }
}
