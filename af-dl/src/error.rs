//! Error types for af-dl
//!
//! - `DownloadError`: failures surfaced by the download pipeline
//! - `ApiError`: HTTP-facing errors rendered as JSON

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::services::engine::EngineError;

/// Pipeline failure
///
/// Every variant is recorded into the job's progress record as `error` and
/// returned to the request handler.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// URL resolved to a playlist or other multi-item collection
    #[error("URL appears to be a playlist ({entries} entries). Use a link to a specific video.")]
    CollectionNotSupported { entries: usize },

    /// Engine reported success but the expected file is absent
    ///
    /// Only the file name reaches users; the full path is logged.
    #[error("Audio file was not created: {}", file_name(.0))]
    OutputMissing(PathBuf),

    /// Any other engine failure
    #[error("{0}")]
    Engine(#[from] EngineError),
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl DownloadError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            DownloadError::CollectionNotSupported { .. } => "COLLECTION_NOT_SUPPORTED",
            DownloadError::OutputMissing(_) => "OUTPUT_MISSING",
            DownloadError::Engine(_) => "DOWNLOAD_FAILED",
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed user input (400)
    #[error("{0}")]
    Validation(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409) - e.g., job id already registered
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Pipeline failure (500)
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Download(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Download(err) => err.code(),
            ApiError::Io(_) => "IO_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(DownloadError::CollectionNotSupported { entries: 3 }).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_download_error_messages() {
        let err = DownloadError::CollectionNotSupported { entries: 12 };
        assert!(err.to_string().contains("playlist"));
        assert_eq!(err.code(), "COLLECTION_NOT_SUPPORTED");

        let err = DownloadError::OutputMissing(PathBuf::from("/tmp/out/song.mp3"));
        assert_eq!(err.to_string(), "Audio file was not created: song.mp3");
        assert!(!err.to_string().contains("/tmp/out"));
        assert_eq!(ApiError::from(err).code(), "OUTPUT_MISSING");
    }
}
