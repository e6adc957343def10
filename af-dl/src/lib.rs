//! af-dl library interface
//!
//! Exposes the service layer and router for the binary and integration tests

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, DownloadError};

use af_common::events::EventBus;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::services::{DownloadPipeline, JobRegistry};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Per-job progress records
    pub registry: Arc<JobRegistry>,
    /// Engine, output directory and tagging
    pub pipeline: Arc<DownloadPipeline>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// How long finished jobs stay pollable
    pub job_retention: Duration,
}

impl AppState {
    pub fn new(pipeline: DownloadPipeline, event_bus: EventBus, job_retention: Duration) -> Self {
        Self {
            registry: Arc::new(JobRegistry::with_events(event_bus.clone())),
            pipeline: Arc::new(pipeline),
            event_bus,
            startup_time: Utc::now(),
            job_retention,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // UI routes (HTML form + client script)
        .merge(api::ui_routes())
        // API routes
        .merge(api::download_routes())
        .merge(api::progress_routes())
        .merge(api::file_routes())
        .merge(api::event_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
