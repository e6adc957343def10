//! Per-job progress tracking
//!
//! Each submitted download owns one `ProgressStore`: a single record behind a
//! mutex, written by the pipeline's progress callback and read by pollers.
//! `JobRegistry` maps job identifiers to their stores so concurrent downloads
//! never share a record.

use af_common::events::{DownloadEvent, EventBus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::models::{DownloadJob, DownloadStatus, ProgressRecord};

/// Lock-protected progress record of one job
///
/// Readers always see a complete snapshot; `set` never exposes a partially
/// updated record.
#[derive(Debug)]
pub struct ProgressStore {
    job_id: Uuid,
    record: Mutex<ProgressRecord>,
    event_bus: Option<EventBus>,
}

impl ProgressStore {
    /// Create an idle store
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            record: Mutex::new(ProgressRecord::idle()),
            event_bus: None,
        }
    }

    /// Create an idle store that broadcasts every change
    pub fn with_events(job_id: Uuid, event_bus: EventBus) -> Self {
        Self {
            event_bus: Some(event_bus),
            ..Self::new(job_id)
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Update status and the provided fields; omitted fields keep their value
    pub fn set(
        &self,
        status: DownloadStatus,
        progress: Option<f64>,
        filename: Option<String>,
        error: Option<String>,
    ) {
        let snapshot = {
            let mut record = self.record.lock().unwrap_or_else(|e| e.into_inner());
            record.status = status;
            if let Some(progress) = progress {
                record.progress = progress;
            }
            if let Some(filename) = filename {
                record.filename = Some(filename);
            }
            if let Some(error) = error {
                record.error = Some(error);
            }
            record.clone()
        };

        self.broadcast(snapshot);
    }

    /// Copy of the current record
    pub fn get(&self) -> ProgressRecord {
        self.record
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn broadcast(&self, snapshot: ProgressRecord) {
        let Some(bus) = &self.event_bus else {
            return;
        };
        let now = Utc::now();
        let event = match snapshot.status {
            DownloadStatus::Complete => DownloadEvent::JobCompleted {
                job_id: self.job_id,
                filename: snapshot.filename.unwrap_or_default(),
                timestamp: now,
            },
            DownloadStatus::Error => DownloadEvent::JobFailed {
                job_id: self.job_id,
                error: snapshot.error.unwrap_or_default(),
                timestamp: now,
            },
            status => DownloadEvent::DownloadProgress {
                job_id: self.job_id,
                status,
                progress: snapshot.progress,
                timestamp: now,
            },
        };
        bus.emit(event);
    }
}

/// Registry errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Job already exists: {0}")]
    DuplicateJob(Uuid),
}

#[derive(Debug)]
struct JobEntry {
    job: DownloadJob,
    store: Arc<ProgressStore>,
    registered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    jobs: HashMap<Uuid, JobEntry>,
    latest: Option<Uuid>,
}

/// Job identifier → progress store
#[derive(Debug, Default)]
pub struct JobRegistry {
    inner: RwLock<RegistryInner>,
    event_bus: Option<EventBus>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose stores broadcast on `event_bus`
    pub fn with_events(event_bus: EventBus) -> Self {
        Self {
            inner: RwLock::default(),
            event_bus: Some(event_bus),
        }
    }

    /// Register a job and return its idle progress store
    pub fn create(&self, job: DownloadJob) -> Result<Arc<ProgressStore>, RegistryError> {
        let job_id = job.job_id;
        let store = Arc::new(match &self.event_bus {
            Some(bus) => ProgressStore::with_events(job_id, bus.clone()),
            None => ProgressStore::new(job_id),
        });

        {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            if inner.jobs.contains_key(&job_id) {
                return Err(RegistryError::DuplicateJob(job_id));
            }
            inner.jobs.insert(
                job_id,
                JobEntry {
                    job: job.clone(),
                    store: Arc::clone(&store),
                    registered_at: Utc::now(),
                },
            );
            inner.latest = Some(job_id);
        }

        if let Some(bus) = &self.event_bus {
            bus.emit(DownloadEvent::JobSubmitted {
                job_id,
                url: job.url,
                quality_kbps: job.quality.kbps(),
                timestamp: Utc::now(),
            });
        }

        Ok(store)
    }

    /// Progress store of a job
    pub fn get(&self, job_id: Uuid) -> Option<Arc<ProgressStore>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.jobs.get(&job_id).map(|entry| Arc::clone(&entry.store))
    }

    /// Submitted job parameters
    pub fn job(&self, job_id: Uuid) -> Option<DownloadJob> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.jobs.get(&job_id).map(|entry| entry.job.clone())
    }

    /// Store of the most recently registered job still in the registry
    pub fn latest(&self) -> Option<Arc<ProgressStore>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .latest
            .and_then(|id| inner.jobs.get(&id))
            .map(|entry| Arc::clone(&entry.store))
    }

    /// Forget which job was registered last
    ///
    /// `latest()` returns `None` until the next `create`; the job itself
    /// stays reachable by id.
    pub fn clear_latest(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.latest = None;
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .jobs
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of jobs not yet complete or failed
    pub fn active_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .jobs
            .values()
            .filter(|entry| !entry.store.get().status.is_terminal())
            .count()
    }

    /// Drop finished jobs registered longer ago than `retention`
    ///
    /// Returns the number of jobs removed. Running jobs are never pruned.
    pub fn prune_finished(&self, retention: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let before = inner.jobs.len();
        inner.jobs.retain(|_, entry| {
            entry.registered_at > cutoff || !entry.store.get().status.is_terminal()
        });
        let removed = before - inner.jobs.len();

        if inner.latest.is_some_and(|id| !inner.jobs.contains_key(&id)) {
            inner.latest = None;
        }
        if removed > 0 {
            debug!(removed, remaining = inner.jobs.len(), "Pruned finished jobs");
        }
        removed
    }
}
