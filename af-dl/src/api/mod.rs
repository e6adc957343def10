//! HTTP API handlers for af-dl
//!
//! HTML form flow, JSON submission, progress polling, file delivery and SSE

pub mod download;
pub mod files;
pub mod health;
pub mod progress;
pub mod sse;
pub mod ui;

pub use download::download_routes;
pub use files::file_routes;
pub use health::health_routes;
pub use progress::progress_routes;
pub use sse::event_routes;
pub use ui::ui_routes;
