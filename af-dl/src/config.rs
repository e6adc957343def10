//! Service configuration resolution for af-dl
//!
//! Priority: command line / environment (via clap) → TOML → compiled default.

use af_common::config::{CompiledDefaults, TomlConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Values supplied on the command line or through environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub output_dir: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    pub output_dir: PathBuf,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_location: Option<PathBuf>,
    pub engine_timeout: Option<Duration>,
    pub album: String,
    pub job_retention: Duration,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge the three configuration tiers
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Self {
        let defaults = CompiledDefaults::default();

        Self {
            bind_address: overrides
                .bind_address
                .or(toml.bind_address)
                .unwrap_or(defaults.bind_address),
            port: overrides.port.or(toml.port).unwrap_or(defaults.port),
            output_dir: overrides
                .output_dir
                .or(toml.output_dir)
                .unwrap_or(defaults.output_dir),
            ytdlp_path: overrides
                .ytdlp_path
                .or(toml.ytdlp_path)
                .unwrap_or(defaults.ytdlp_path),
            ffmpeg_location: toml.ffmpeg_location,
            engine_timeout: toml
                .engine_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            album: toml.album.unwrap_or(defaults.album),
            job_retention: Duration::from_secs(
                toml.job_retention_secs.unwrap_or(defaults.job_retention_secs),
            ),
            log_level: toml.logging.level.unwrap_or(defaults.log_level),
        }
    }

    /// Socket address to listen on
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|e| format!("Invalid bind address '{}': {}", self.bind_address, e))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn log_summary(&self) {
        info!("Output directory: {}", self.output_dir.display());
        info!("yt-dlp: {}", self.ytdlp_path.display());
        if let Some(ffmpeg) = &self.ffmpeg_location {
            info!("ffmpeg location: {}", ffmpeg.display());
        }
        match self.engine_timeout {
            Some(limit) => info!("Engine timeout: {}s", limit.as_secs()),
            None => info!("Engine timeout: none"),
        }
        info!("Album tag: {}", self.album);
        info!("Finished jobs kept for {}s", self.job_retention.as_secs());
    }
}
