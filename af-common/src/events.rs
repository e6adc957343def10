//! Event types for the audiofetch event system
//!
//! Provides the download event definitions and the EventBus used to fan them
//! out to SSE clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Lifecycle status of a single download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Nothing submitted yet
    #[default]
    Idle,
    /// Engine is transferring or transcoding
    Downloading,
    /// File produced and tagged
    Complete,
    /// Pipeline failed; see the record's error message
    Error,
}

impl DownloadStatus {
    /// Whether the status is final for its job
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Complete | DownloadStatus::Error)
    }
}

/// Download event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    /// A URL was accepted and a job registered
    JobSubmitted {
        job_id: Uuid,
        url: String,
        quality_kbps: u32,
        timestamp: DateTime<Utc>,
    },

    /// Progress record of a job changed
    DownloadProgress {
        job_id: Uuid,
        status: DownloadStatus,
        progress: f64,
        timestamp: DateTime<Utc>,
    },

    /// Pipeline finished and the file is ready to serve
    JobCompleted {
        job_id: Uuid,
        filename: String,
        timestamp: DateTime<Utc>,
    },

    /// Pipeline failed
    JobFailed {
        job_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl DownloadEvent {
    /// Event type name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            DownloadEvent::JobSubmitted { .. } => "JobSubmitted",
            DownloadEvent::DownloadProgress { .. } => "DownloadProgress",
            DownloadEvent::JobCompleted { .. } => "JobCompleted",
            DownloadEvent::JobFailed { .. } => "JobFailed",
        }
    }

    /// Job the event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            DownloadEvent::JobSubmitted { job_id, .. }
            | DownloadEvent::DownloadProgress { job_id, .. }
            | DownloadEvent::JobCompleted { job_id, .. }
            | DownloadEvent::JobFailed { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast bus for download events
///
/// Cloning is cheap; all clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DownloadEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    ///
    /// # Examples
    ///
    /// ```
    /// use af_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of subscribers reached. Having no subscribers is
    /// normal (nobody is watching the SSE stream) and returns 0.
    pub fn emit(&self, event: DownloadEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
