//! Embedded client script

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

const DOWNLOAD_JS: &str = include_str!("../../../static/download.js");

/// GET /static/download.js
pub async fn serve_download_js() -> Response {
    (
        StatusCode::OK,
        [
            ("content-type", "application/javascript"),
            ("cache-control", "no-cache, no-store, must-revalidate"),
        ],
        DOWNLOAD_JS,
    )
        .into_response()
}
