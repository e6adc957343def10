//! Download job submitted through the web shell

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lowest accepted MP3 bitrate (kbps)
pub const MIN_BITRATE_KBPS: u32 = 32;
/// Highest accepted MP3 bitrate (kbps)
pub const MAX_BITRATE_KBPS: u32 = 320;
/// Bitrate used when the form omits `quality`
pub const DEFAULT_BITRATE_KBPS: u32 = 192;

/// Target MP3 bitrate in kbps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioQuality(u32);

impl AudioQuality {
    /// Parse a form value such as `"192"` or `"192k"`
    pub fn parse(value: &str) -> Result<Self, String> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_suffix('k')
            .or_else(|| trimmed.strip_suffix('K'))
            .unwrap_or(trimmed);

        let kbps: u32 = digits
            .parse()
            .map_err(|_| format!("Invalid audio quality: '{}'", value))?;
        Self::from_kbps(kbps)
    }

    /// Validate a bitrate given in kbps
    pub fn from_kbps(kbps: u32) -> Result<Self, String> {
        if !(MIN_BITRATE_KBPS..=MAX_BITRATE_KBPS).contains(&kbps) {
            return Err(format!(
                "Audio quality must be between {} and {} kbps, got {}",
                MIN_BITRATE_KBPS, MAX_BITRATE_KBPS, kbps
            ));
        }
        Ok(Self(kbps))
    }

    pub fn kbps(&self) -> u32 {
        self.0
    }
}

impl Default for AudioQuality {
    fn default() -> Self {
        Self(DEFAULT_BITRATE_KBPS)
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One submitted URL
///
/// The produced file is not tracked here; it surfaces only through the job's
/// progress record once the download completes.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadJob {
    pub job_id: Uuid,
    pub url: String,
    pub quality: AudioQuality,
    pub submitted_at: DateTime<Utc>,
}

impl DownloadJob {
    /// Create a job with a fresh identifier
    pub fn new(url: impl Into<String>, quality: AudioQuality) -> Self {
        Self::with_id(Uuid::new_v4(), url, quality)
    }

    /// Create a job with a caller-chosen identifier
    pub fn with_id(job_id: Uuid, url: impl Into<String>, quality: AudioQuality) -> Self {
        Self {
            job_id,
            url: url.into(),
            quality,
            submitted_at: Utc::now(),
        }
    }
}
