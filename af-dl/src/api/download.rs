//! Download submission handlers
//!
//! POST / (form flow, blocking), POST /api/downloads (JSON, background),
//! GET /api/downloads/:job_id

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{AudioQuality, DownloadJob, DownloadStatus, ProgressRecord};
use crate::services::{url_validator, ProgressStore};
use crate::AppState;

/// POST / form fields
#[derive(Debug, Default, Deserialize)]
pub struct DownloadForm {
    #[serde(default)]
    pub youtube_url: String,
    #[serde(default)]
    pub quality: Option<String>,
    /// Client-chosen id so the page can poll while this request blocks
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Bitrate given either as a number or as a string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QualityInput {
    Kbps(u32),
    Text(String),
}

/// POST /api/downloads request
#[derive(Debug, Deserialize)]
pub struct SubmitDownloadRequest {
    pub url: String,
    #[serde(default)]
    pub quality: Option<QualityInput>,
}

/// POST /api/downloads response
#[derive(Debug, Serialize)]
pub struct SubmitDownloadResponse {
    pub job_id: Uuid,
    pub status: DownloadStatus,
}

/// GET /api/downloads/:job_id response
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub url: String,
    pub quality_kbps: u32,
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub progress: ProgressRecord,
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false)
}

fn parse_quality(raw: Option<&str>) -> ApiResult<AudioQuality> {
    match raw.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => AudioQuality::parse(q).map_err(ApiError::Validation),
        None => Ok(AudioQuality::default()),
    }
}

/// Validate input and register a new job
fn register_job(
    state: &AppState,
    url: &str,
    quality: AudioQuality,
    job_id: Option<Uuid>,
) -> ApiResult<(DownloadJob, Arc<ProgressStore>)> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ApiError::Validation("Please enter a YouTube URL".to_string()));
    }
    if !url_validator::is_valid(url) {
        return Err(ApiError::Validation("Invalid YouTube URL".to_string()));
    }

    let pruned = state.registry.prune_finished(state.job_retention);
    if pruned > 0 {
        info!(pruned, "Pruned finished jobs");
    }

    let job = match job_id {
        Some(id) => DownloadJob::with_id(id, url, quality),
        None => DownloadJob::new(url, quality),
    };
    let store = state
        .registry
        .create(job.clone())
        .map_err(|e| ApiError::Conflict(e.to_string()))?;

    info!(
        job_id = %job.job_id,
        url = %job.url,
        video_id = ?url_validator::extract_id(&job.url),
        quality_kbps = job.quality.kbps(),
        "Download job registered"
    );
    Ok((job, store))
}

/// Run the pipeline on its own task
///
/// A dropped request does not abort the download; the job stays pollable.
async fn run_job(state: &AppState, job: DownloadJob, store: Arc<ProgressStore>) -> ApiResult<String> {
    let pipeline = state.pipeline.clone();
    let task_store = store.clone();
    let handle = tokio::spawn(async move { pipeline.run(&job, &task_store).await });

    match handle.await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            error!(job_id = %store.job_id(), "Download task aborted: {}", e);
            store.set(DownloadStatus::Error, None, None, Some(e.to_string()));
            Err(ApiError::Internal(e.to_string()))
        }
    }
}

/// POST /
///
/// Blocks until the download finishes. `Accept: application/json` selects a
/// JSON answer; otherwise the browser is redirected back to the form.
pub async fn submit_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<DownloadForm>,
) -> Response {
    let json = wants_json(&headers);

    let registered = form
        .job_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            Uuid::parse_str(id).map_err(|_| ApiError::Validation(format!("Invalid job id: {}", id)))
        })
        .transpose()
        .and_then(|job_id| {
            let quality = parse_quality(form.quality.as_deref())?;
            register_job(&state, &form.youtube_url, quality, job_id)
        });

    let (job_id, outcome) = match registered {
        Ok((job, store)) => {
            let job_id = job.job_id;
            (Some(job_id), run_job(&state, job, store).await)
        }
        Err(e) => (None, Err(e)),
    };

    match (json, outcome) {
        (true, Ok(filename)) => Json(json!({
            "success": true,
            "job_id": job_id,
            "filename": filename,
        }))
        .into_response(),
        (true, Err(e)) => (
            e.status(),
            Json(json!({
                "success": false,
                "job_id": job_id,
                "error": e.to_string(),
            })),
        )
            .into_response(),
        (false, Ok(filename)) => {
            let location = flash_location(
                &format!("Download complete: {}", filename),
                "success",
                Some(&filename),
            );
            Redirect::to(&location).into_response()
        }
        (false, Err(e)) => {
            let message = match &e {
                ApiError::Validation(msg) => msg.clone(),
                other => format!("Error: {}", other),
            };
            Redirect::to(&flash_location(&message, "error", None)).into_response()
        }
    }
}

/// `/` with a one-shot flash message in the query string
fn flash_location(message: &str, level: &str, file: Option<&str>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("flash", message);
    query.append_pair("level", level);
    if let Some(file) = file {
        query.append_pair("file", file);
    }
    format!("/?{}", query.finish())
}

/// Percent-encoded `/downloads/<filename>` path
pub fn download_href(filename: &str) -> Option<String> {
    let mut base = Url::parse("http://localhost/downloads/").ok()?;
    base.path_segments_mut().ok()?.pop_if_empty().push(filename);
    Some(base.path().to_string())
}

/// POST /api/downloads
///
/// Registers the job and answers 202 right away; the download runs in the
/// background. Poll `/progress/:job_id` or subscribe to `/events`.
pub async fn submit_download(
    State(state): State<AppState>,
    Json(request): Json<SubmitDownloadRequest>,
) -> ApiResult<impl IntoResponse> {
    let quality = match request.quality {
        Some(QualityInput::Kbps(kbps)) => {
            AudioQuality::from_kbps(kbps).map_err(ApiError::Validation)?
        }
        Some(QualityInput::Text(text)) => parse_quality(Some(&text))?,
        None => AudioQuality::default(),
    };
    let (job, store) = register_job(&state, &request.url, quality, None)?;

    let response = SubmitDownloadResponse {
        job_id: job.job_id,
        status: store.get().status,
    };

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        let job_id = job.job_id;
        info!(job_id = %job_id, "Background download task started");
        if let Err(e) = pipeline.run(&job, &store).await {
            error!(job_id = %job_id, code = e.code(), "Background download failed: {}", e);
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/downloads/:job_id
pub async fn get_download(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatusResponse>> {
    let not_found = || ApiError::NotFound(format!("Download job not found: {}", job_id));
    let job = state.registry.job(job_id).ok_or_else(not_found)?;
    let store = state.registry.get(job_id).ok_or_else(not_found)?;

    Ok(Json(JobStatusResponse {
        job_id,
        url: job.url,
        quality_kbps: job.quality.kbps(),
        submitted_at: job.submitted_at,
        progress: store.get(),
    }))
}

/// Build download routes
pub fn download_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_form))
        .route("/api/downloads", post(submit_download))
        .route("/api/downloads/:job_id", get(get_download))
}
