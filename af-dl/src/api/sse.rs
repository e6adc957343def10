//! Server-Sent Events for download progress

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::AppState;

/// GET /events query parameters
#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    /// Only forward events of this job
    pub job_id: Option<Uuid>,
}

/// GET /events
///
/// Streams JobSubmitted, DownloadProgress, JobCompleted and JobFailed events
pub async fn download_event_stream(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    af_common::sse::create_event_sse_stream("af-dl", &state.event_bus, filter.job_id)
}

/// Build event stream routes
pub fn event_routes() -> Router<AppState> {
    Router::new().route("/events", get(download_event_stream))
}
