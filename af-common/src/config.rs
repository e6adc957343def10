//! Bootstrap configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Priorities 1 and 2 are handled by each service's `clap` arguments; this
//! module owns the TOML layer and the compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional; missing values fall through to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Address to bind the HTTP listener to
    #[serde(default)]
    pub bind_address: Option<String>,

    /// HTTP listener port
    #[serde(default)]
    pub port: Option<u16>,

    /// Flat directory receiving downloaded audio files
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Path or name of the yt-dlp executable
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Directory (or binary) handed to yt-dlp as `--ffmpeg-location`
    #[serde(default)]
    pub ffmpeg_location: Option<PathBuf>,

    /// Abort the extraction engine after this many seconds (no limit when unset)
    #[serde(default)]
    pub engine_timeout_secs: Option<u64>,

    /// Album tag written into every downloaded file
    #[serde(default)]
    pub album: Option<String>,

    /// Seconds a finished job stays pollable before it is pruned
    #[serde(default)]
    pub job_retention_secs: Option<u64>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when RUST_LOG is not set (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

/// Compiled defaults for the downloader service
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub bind_address: String,
    pub port: u16,
    pub output_dir: PathBuf,
    pub ytdlp_path: PathBuf,
    pub album: String,
    pub job_retention_secs: u64,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5780,
            output_dir: PathBuf::from("static/downloads"),
            ytdlp_path: PathBuf::from(if cfg!(target_os = "windows") {
                "yt-dlp.exe"
            } else {
                "yt-dlp"
            }),
            album: "YouTube Download".to_string(),
            job_retention_secs: 3600,
            log_level: "info".to_string(),
        }
    }
}

/// Default location of a service's TOML file: `<config dir>/audiofetch/<service>.toml`
pub fn default_config_path(service_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("audiofetch").join(format!("{}.toml", service_name)))
}

/// Parse a TOML config from a string
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load a TOML config file
///
/// A missing file is not an error: a warning is logged and defaults are
/// returned. A file that exists but cannot be read or parsed is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config = parse_toml_config(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Create the output directory (and parents) if missing
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created directory: {}", path.display());
    } else if !path.is_dir() {
        return Err(Error::Config(format!(
            "Path exists but is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}
