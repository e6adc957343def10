//! af-dl - YouTube to MP3 download service
//!
//! Serves a small web form; each submitted URL is fetched with yt-dlp,
//! transcoded to MP3 at the requested bitrate, tagged and offered for download.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use af_common::config::{default_config_path, ensure_directory_exists, load_toml_config};
use af_common::events::EventBus;
use af_dl::config::{ConfigOverrides, ServiceConfig};
use af_dl::services::{DownloadPipeline, MetadataEnhancer, YtDlpEngine};
use af_dl::AppState;

/// Command-line arguments for af-dl
#[derive(Parser, Debug)]
#[command(name = "af-dl")]
#[command(about = "YouTube to MP3 download service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "AF_PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(long, env = "AF_BIND")]
    bind: Option<String>,

    /// Directory receiving downloaded MP3 files
    #[arg(short, long, env = "AF_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// TOML config file (default: <config dir>/audiofetch/af-dl.toml)
    #[arg(short, long, env = "AF_CONFIG")]
    config: Option<PathBuf>,

    /// yt-dlp executable
    #[arg(long, env = "AF_YTDLP")]
    ytdlp: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // TOML is read before tracing is up so its log level can apply
    let config_path = args.config.clone().or_else(|| default_config_path("af-dl"));
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Default::default(),
    };

    let config = ServiceConfig::resolve(
        ConfigOverrides {
            bind_address: args.bind,
            port: args.port,
            output_dir: args.output_dir,
            ytdlp_path: args.ytdlp,
        },
        toml_config,
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("af_dl={0},af_common={0},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "af-dl v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }
    config.log_summary();

    ensure_directory_exists(&config.output_dir).context("Failed to prepare output directory")?;

    let engine = YtDlpEngine::new(config.ytdlp_path.clone())
        .with_ffmpeg_location(config.ffmpeg_location.clone())
        .with_timeout(config.engine_timeout);
    let pipeline = DownloadPipeline::new(
        Arc::new(engine),
        config.output_dir.clone(),
        MetadataEnhancer::new(config.album.clone()),
    );

    let event_bus = EventBus::new(100);
    let state = AppState::new(pipeline, event_bus, config.job_retention);
    let app = af_dl::build_router(state);

    let addr = config
        .socket_addr()
        .map_err(anyhow::Error::msg)
        .context("Invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
