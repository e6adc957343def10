//! Server-Sent Events (SSE) utilities

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Heartbeat interval for SSE streams
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Create an SSE stream forwarding download events from the bus
///
/// When `job_filter` is set only that job's events are forwarded.
///
/// # Example
/// ```rust,ignore
/// pub async fn download_event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     af_common::sse::create_event_sse_stream("af-dl", &state.event_bus, None)
/// }
/// ```
pub fn create_event_sse_stream(
    service_name: &'static str,
    event_bus: &EventBus,
    job_filter: Option<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} download events", service_name);

    let mut rx = event_bus.subscribe();

    let stream = async_stream::stream! {
        // Send initial connected status
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if job_filter.is_some_and(|id| id != event.job_id()) {
                        continue;
                    }
                    let event_type = event.event_type().to_string();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting download event: {}", event_type);
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: client lagged, {} events dropped", skipped);
                }
                Err(RecvError::Closed) => {
                    info!("SSE: event bus closed, ending {} stream", service_name);
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
