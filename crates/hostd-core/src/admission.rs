//! Single-flight admission.
//!
//! [`AdmissionLock`] grants the one execution slot with blocking or
//! immediate acquisition. The slot itself lives in the [`BusyTracker`]: a
//! grant is the same critical section that marks the job busy, and release
//! is the same critical section that clears it, so a denied caller always
//! sees the holder's snapshot. Blocking callers park on a [`Notify`] until
//! the slot frees up.
//!
//! [`AdmissionController`] wraps grants in an [`Admission`] guard whose drop
//! releases the slot, so release happens exactly once on every path,
//! including unwinding.

use crate::busy::{BusySnapshot, BusyTracker};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::debug;

// ---------------------------------------------------------------------------
// AdmissionLock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AdmissionLock {
    busy: Arc<BusyTracker>,
    released: Arc<Notify>,
}

#[derive(Debug)]
pub enum Grant {
    Granted,
    /// The slot is taken; carries the holder as seen at denial time.
    Denied(BusySnapshot),
}

impl AdmissionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `job_id`. Blocking mode waits for the current
    /// holder to release; non-blocking mode returns `Denied` immediately.
    pub async fn acquire(&self, job_id: &str, action: &str, blocking: bool) -> Grant {
        loop {
            // Register interest before checking so a release between the
            // check and the await still wakes us.
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            match self.busy.try_claim(job_id, action) {
                Ok(()) => return Grant::Granted,
                Err(holder) if !blocking => return Grant::Denied(holder),
                Err(_) => released.await,
            }
        }
    }

    /// Free the slot and wake one blocked caller. Harmless when nothing is
    /// held.
    pub fn release(&self) {
        self.busy.clear();
        self.released.notify_one();
    }

    pub fn is_held(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn snapshot(&self) -> BusySnapshot {
        self.busy.snapshot()
    }
}

// ---------------------------------------------------------------------------
// AdmissionController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AdmissionController {
    lock: AdmissionLock,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire admission for `job_id`. On denial the holder's busy snapshot
    /// is returned so the caller can report who has the slot.
    pub async fn admit(
        &self,
        job_id: &str,
        action: &str,
        blocking: bool,
    ) -> Result<Admission, BusySnapshot> {
        if let Grant::Denied(holder) = self.lock.acquire(job_id, action, blocking).await {
            return Err(holder);
        }
        debug!(job_id, action, "admission granted");
        Ok(Admission {
            lock: self.lock.clone(),
            job_id: job_id.to_string(),
            action: action.to_string(),
            admitted_at: Instant::now(),
        })
    }

    pub fn snapshot(&self) -> BusySnapshot {
        self.lock.snapshot()
    }

    /// True while a job holds admission.
    pub fn is_busy(&self) -> bool {
        self.lock.is_held()
    }
}

// ---------------------------------------------------------------------------
// Admission guard
// ---------------------------------------------------------------------------

/// Proof of admission for one job. Busy-state stays marked for exactly as
/// long as this value lives.
#[derive(Debug)]
pub struct Admission {
    lock: AdmissionLock,
    job_id: String,
    action: String,
    admitted_at: Instant,
}

impl Admission {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn elapsed(&self) -> Duration {
        self.admitted_at.elapsed()
    }

    /// Release now instead of at end of scope.
    pub fn release(self) {}
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.lock.release();
        debug!(job_id = %self.job_id, action = %self.action, "admission released");
    }
}
