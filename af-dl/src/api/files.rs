//! Delivery of finished audio files

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::io::ErrorKind;
use std::path::{Component, Path as FsPath};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Only plain names inside the output directory are served
///
/// The name must be a single normal path component. Dots inside a name
/// (`Wait....mp3`) are fine; `.` and `..` on their own are not.
fn validate_filename(filename: &str) -> ApiResult<()> {
    let mut components = FsPath::new(filename).components();
    let single_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_name || filename.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        return Err(ApiError::Validation(format!(
            "Invalid file name: {}",
            filename
        )));
    }
    Ok(())
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
fn content_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let mut encoded = String::with_capacity(filename.len() * 3);
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// GET /downloads/:filename
///
/// Streams a produced MP3 as an attachment
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    validate_filename(&filename)?;

    let path = state.pipeline.output_dir().join(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("File not found: {}", filename)));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound(format!("File not found: {}", filename)));
    }
    debug!(file = %path.display(), bytes = metadata.len(), "Serving download");

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg")),
            (header::CONTENT_LENGTH, HeaderValue::from(metadata.len())),
            (header::CONTENT_DISPOSITION, content_disposition(&filename)),
        ],
        body,
    )
        .into_response())
}

/// Build file delivery routes
pub fn file_routes() -> Router<AppState> {
    Router::new().route("/downloads/:filename", get(download_file))
}
