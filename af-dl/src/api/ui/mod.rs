//! UI Routes - HTML form and client script
//!
//! - **Root Page** (`root`): URL form, quality select, flash messages, progress bar
//! - **Static Assets** (`static_assets`): embedded JavaScript

use axum::{routing::get, Router};

use crate::AppState;

mod root;
mod static_assets;

use root::root_page;
use static_assets::serve_download_js;

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_page))
        .route("/static/download.js", get(serve_download_js))
}
