//! Shared fixtures for af-dl integration tests
//!
//! `StubEngine` stands in for yt-dlp: it replays scripted progress ticks and
//! writes (or deliberately skips) the output file the pipeline expects.

#![allow(dead_code)]

use af_dl::services::engine::{
    EngineError, EngineRequest, MediaEngine, MediaInfo, ProgressCallback, ProgressTick, TickStatus,
};
use af_dl::services::url_validator;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// A few silent MPEG-1 Layer III frames (128 kbps, 44.1 kHz)
pub fn silent_mp3() -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut data = Vec::with_capacity(FRAME_LEN * 8);
    for _ in 0..8 {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);
        data.extend_from_slice(&frame);
    }
    data
}

pub fn downloading_tick(percent: &str) -> ProgressTick {
    ProgressTick {
        status: TickStatus::Downloading,
        percent_str: Some(percent.to_string()),
        downloaded_bytes_str: None,
        total_bytes_str: None,
    }
}

/// What the stub does when asked to fetch
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Emit ticks, then write `<output_dir>/Video <id>.mp3` with `contents`
    Produce { contents: Vec<u8> },
    /// Emit ticks but never write the MP3
    SkipOutput,
    /// Report a collection of `entries` items
    Collection { entries: usize },
    /// Fail like a broken extractor
    Fail { message: String },
}

pub struct StubEngine {
    behavior: StubBehavior,
    ticks: Vec<ProgressTick>,
    gate: Option<Arc<Semaphore>>,
    requests: Mutex<Vec<EngineRequest>>,
}

impl StubEngine {
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            ticks: vec![
                downloading_tick("0.0%"),
                downloading_tick("25.0%"),
                downloading_tick("50.0%"),
                downloading_tick("100.0%"),
            ],
            gate: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Writes a valid MP3 for every request
    pub fn producing() -> Self {
        Self::new(StubBehavior::Produce {
            contents: silent_mp3(),
        })
    }

    pub fn with_ticks(mut self, ticks: Vec<ProgressTick>) -> Self {
        self.ticks = ticks;
        self
    }

    /// Hold every fetch until a permit is added to `gate`
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// `Video <id>` for the URL's video id
pub fn stem_for(url: &str) -> String {
    format!(
        "Video {}",
        url_validator::extract_id(url).unwrap_or_else(|| "unknown".to_string())
    )
}

fn info_for(request: &EngineRequest) -> MediaInfo {
    let stem = stem_for(&request.url);
    MediaInfo {
        title: Some(format!("{} <Official>", stem)),
        uploader: Some("Stub Channel".to_string()),
        prepared_filename: request.output_dir.join(format!("{}.webm", stem)),
        entry_count: None,
    }
}

#[async_trait]
impl MediaEngine for StubEngine {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch(
        &self,
        request: &EngineRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Result<MediaInfo, EngineError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await;
            if let Ok(permit) = permit {
                permit.forget();
            }
        }

        match &self.behavior {
            StubBehavior::Collection { entries } => Ok(MediaInfo {
                title: Some("Some Playlist".to_string()),
                entry_count: Some(*entries),
                ..Default::default()
            }),
            StubBehavior::Fail { message } => Err(EngineError::Failed {
                engine: "stub".to_string(),
                code: Some(1),
                message: message.clone(),
            }),
            StubBehavior::SkipOutput => {
                for tick in &self.ticks {
                    on_progress(tick);
                }
                Ok(info_for(request))
            }
            StubBehavior::Produce { contents } => {
                for tick in &self.ticks {
                    on_progress(tick);
                }
                let info = info_for(request);
                let target = info.prepared_filename.with_extension("mp3");
                tokio::fs::write(&target, contents).await?;
                Ok(info)
            }
        }
    }
}

pub fn mp3_path(output_dir: &Path, url: &str) -> std::path::PathBuf {
    output_dir.join(format!("{}.mp3", stem_for(url)))
}
