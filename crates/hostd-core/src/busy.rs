//! Busy-state tracker: the observable record of the job currently holding
//! admission, if any.
//!
//! Guarded by a short-held mutex that is never held across an await, so
//! status reads never wait on a queued admission. The occupied slot is also
//! the admission flag: [`BusyTracker::try_claim`] checks and marks in one
//! critical section, so "lock held" and "job running" cannot disagree. Only
//! [`crate::admission`] mutates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

#[derive(Debug, Clone)]
struct RunningJob {
    job_id: String,
    action: String,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl RunningJob {
    fn snapshot(&self) -> BusySnapshot {
        let running = self.started.elapsed().as_secs_f64();
        BusySnapshot {
            busy: true,
            job_id: Some(self.job_id.clone()),
            action: Some(self.action.clone()),
            started_at: Some(self.started_at.timestamp_millis() as f64 / 1000.0),
            running_for_s: Some((running * 1000.0).round() / 1000.0),
        }
    }
}

/// Point-in-time view of the tracker. All fields other than `busy` are
/// `None` when idle; `running_for_s` is derived at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusySnapshot {
    pub busy: bool,
    pub job_id: Option<String>,
    pub action: Option<String>,
    /// Unix epoch seconds.
    pub started_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_for_s: Option<f64>,
}

impl BusySnapshot {
    pub fn idle() -> Self {
        Self {
            busy: false,
            job_id: None,
            action: None,
            started_at: None,
            running_for_s: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct BusyTracker {
    current: Mutex<Option<RunningJob>>,
}

impl BusyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunningJob>> {
        // A panic while holding this lock cannot leave a half-written job.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark `job_id` busy if the slot is free. When it is taken, the
    /// snapshot of the holder is read under the same lock.
    pub(crate) fn try_claim(&self, job_id: &str, action: &str) -> Result<(), BusySnapshot> {
        let mut current = self.lock();
        if let Some(job) = current.as_ref() {
            return Err(job.snapshot());
        }
        *current = Some(RunningJob {
            job_id: job_id.to_string(),
            action: action.to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
        });
        Ok(())
    }

    /// Free the slot. Safe to call when nothing is held.
    pub(crate) fn clear(&self) {
        *self.lock() = None;
    }

    pub fn is_busy(&self) -> bool {
        self.lock().is_some()
    }

    pub fn snapshot(&self) -> BusySnapshot {
        self.lock()
            .as_ref()
            .map_or_else(BusySnapshot::idle, RunningJob::snapshot)
    }
}
