//! Execution engine: validates a run request, admits it through the
//! single-flight controller, runs the derived process, and reports.

use crate::action::{ActionRegistry, Invocation};
use crate::admission::{Admission, AdmissionController};
use crate::busy::BusySnapshot;
use crate::error::{HostdError, Result};
use crate::executor::run_invocation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub action: String,
    pub args: Map<String, Value>,
    /// Block until admitted instead of failing fast when busy.
    pub wait: bool,
}

/// The process ran to completion. `ok` is true only for exit code 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub ok: bool,
    pub job_id: String,
    pub action: String,
    pub rc: i32,
    pub duration_ms: u64,
    pub stdout: String,
    pub stderr: String,
}

/// The job was admitted but the engine could not run it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub ok: bool,
    pub job_id: String,
    pub action: String,
    pub error: String,
    pub detail: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(JobReport),
    Failed(JobFailure),
}

impl JobOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Completed(r) => &r.job_id,
            JobOutcome::Failed(f) => &f.job_id,
        }
    }

    pub fn ok(&self) -> bool {
        matches!(self, JobOutcome::Completed(r) if r.ok)
    }
}

pub fn generate_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Cheap to clone; every clone shares the same registry and controller.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<ActionRegistry>,
    admission: AdmissionController,
}

impl Engine {
    pub fn new(registry: ActionRegistry) -> Self {
        Self::with_controller(registry, AdmissionController::new())
    }

    pub fn with_controller(registry: ActionRegistry, admission: AdmissionController) -> Self {
        Self {
            registry: Arc::new(registry),
            admission,
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn snapshot(&self) -> BusySnapshot {
        self.admission.snapshot()
    }

    /// Validate, admit, and execute one request.
    ///
    /// Caller errors (unknown action, bad arguments) are returned before
    /// admission is attempted and never touch busy-state. A denied
    /// non-blocking request returns [`HostdError::Busy`]. Once admitted the
    /// outcome is always `Ok`, and busy-state is clear and the lock released
    /// before this returns.
    pub async fn submit(&self, req: RunRequest) -> Result<JobOutcome> {
        let invocation = self.registry.build(&req.action, &req.args)?;
        let job_id = generate_job_id();

        let admission = match self.admission.admit(&job_id, &req.action, req.wait).await {
            Ok(a) => a,
            Err(snapshot) => {
                warn!(
                    action = %req.action,
                    running = snapshot.job_id.as_deref().unwrap_or("-"),
                    "run rejected: busy"
                );
                return Err(HostdError::Busy(snapshot));
            }
        };
        info!(job_id = %job_id, action = %req.action, argv = ?invocation.argv(), "job admitted");

        Ok(self.execute(admission, invocation).await)
    }

    /// Run an admitted job to completion.
    ///
    /// The process runs in a detached task that owns the admission, so a
    /// caller that stops waiting does not abort the job or free the slot
    /// early.
    pub async fn execute(&self, admission: Admission, invocation: Invocation) -> JobOutcome {
        let job_id = admission.job_id().to_string();
        let action = admission.action().to_string();
        let started = Instant::now();

        let task = tokio::spawn(async move {
            let result = run_invocation(&invocation).await;
            let elapsed = admission.elapsed();
            admission.release();
            (result, elapsed)
        });

        let (result, elapsed) = match task.await {
            Ok(done) => done,
            Err(e) => (Err(HostdError::JobPanicked(e.to_string())), started.elapsed()),
        };
        let duration_ms = millis(elapsed);

        match result {
            Ok(out) => {
                if out.success() {
                    info!(job_id = %job_id, action = %action, rc = out.rc, duration_ms, "job finished");
                } else {
                    warn!(job_id = %job_id, action = %action, rc = out.rc, duration_ms, "job exited non-zero");
                }
                JobOutcome::Completed(JobReport {
                    ok: out.success(),
                    job_id,
                    action,
                    rc: out.rc,
                    duration_ms,
                    stdout: out.stdout,
                    stderr: out.stderr,
                })
            }
            Err(e) => {
                error!(job_id = %job_id, action = %action, error = %e, duration_ms, "job failed");
                JobOutcome::Failed(JobFailure {
                    ok: false,
                    job_id,
                    action,
                    error: "exception".to_string(),
                    detail: e.to_string(),
                    duration_ms,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{RESTORE_ACTION, SHED_ACTION};
    use crate::executor::tests::write_script;
    use serde_json::json;

    fn req(action: &str, args: Value, wait: bool) -> RunRequest {
        RunRequest {
            action: action.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
            wait,
        }
    }

    #[tokio::test]
    async fn successful_run_reports_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = write_script(dir.path(), "shed.sh", "printf done");
        let engine = Engine::new(ActionRegistry::gpu_shed(&script));

        let outcome = engine
            .submit(req(SHED_ACTION, json!({"protect": "comfyui", "high_only": true}), true))
            .await
            .unwrap();
        let JobOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert!(report.ok);
        assert_eq!(report.rc, 0);
        assert_eq!(report.stdout, "done");
        assert_eq!(report.stderr, "");
        assert!(!report.job_id.is_empty());
        assert!(!engine.snapshot().busy);
    }

    #[tokio::test]
    async fn non_zero_exit_is_completed_not_failed() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = write_script(dir.path(), "shed.sh", "echo nope >&2; exit 2");
        let engine = Engine::new(ActionRegistry::gpu_shed(&script));

        let outcome = engine.submit(req(RESTORE_ACTION, json!({}), false)).await.unwrap();
        match outcome {
            JobOutcome::Completed(r) => {
                assert!(!r.ok);
                assert_eq!(r.rc, 2);
                assert_eq!(r.stderr, "nope\n");
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(!engine.admission().is_busy());
    }

    #[tokio::test]
    async fn missing_target_fails_and_releases() {
        let engine = Engine::new(ActionRegistry::gpu_shed("/nonexistent/gpu-shed.sh"));
        let outcome = engine.submit(req(SHED_ACTION, json!({}), true)).await.unwrap();
        match &outcome {
            JobOutcome::Failed(f) => {
                assert!(!f.ok);
                assert_eq!(f.error, "exception");
                assert!(f.detail.contains("/nonexistent/gpu-shed.sh"));
                assert_eq!(f.action, SHED_ACTION);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!outcome.ok());
        assert!(!engine.admission().is_busy());
        assert!(!engine.snapshot().busy);
    }

    #[tokio::test]
    async fn spawn_fault_fails_and_releases() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("gpu-shed.txt");
        std::fs::write(&target, "not a program").unwrap();
        let engine = Engine::new(ActionRegistry::gpu_shed(&target));

        let outcome = engine.submit(req(SHED_ACTION, json!({}), true)).await.unwrap();
        let JobOutcome::Failed(failure) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(!failure.ok);
        assert_eq!(failure.error, "exception");
        assert!(!failure.job_id.is_empty());
        assert!(failure.detail.contains("gpu-shed.txt"), "got {}", failure.detail);
        assert!(!engine.admission().is_busy());
        assert!(!engine.snapshot().busy);

        let next = engine.submit(req(RESTORE_ACTION, json!({}), false)).await.unwrap();
        assert!(matches!(next, JobOutcome::Failed(_)), "slot should be free for wait=0");
        assert!(!engine.snapshot().busy);
    }

    #[tokio::test]
    async fn caller_errors_never_admit() {
        let engine = Engine::new(ActionRegistry::gpu_shed("/nonexistent/gpu-shed.sh"));

        let err = engine.submit(req("nope", json!({}), true)).await.unwrap_err();
        assert!(matches!(err, HostdError::UnknownAction(_)));

        let err = engine
            .submit(req(SHED_ACTION, json!({"all": "perhaps"}), true))
            .await
            .unwrap_err();
        assert!(matches!(err, HostdError::InvalidArgs { .. }));
        assert!(!engine.snapshot().busy);
    }

    #[tokio::test]
    async fn busy_engine_rejects_non_blocking_and_queues_blocking() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = write_script(dir.path(), "shed.sh", "sleep 0.4; printf slow");
        let engine = Engine::new(ActionRegistry::gpu_shed(&script));

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(req(SHED_ACTION, json!({}), true)).await })
        };
        while !engine.snapshot().busy {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let running = engine.snapshot().job_id.unwrap();

        let err = engine.submit(req(RESTORE_ACTION, json!({}), false)).await.unwrap_err();
        match err {
            HostdError::Busy(snap) => {
                assert_eq!(snap.job_id.as_deref(), Some(running.as_str()));
                assert_eq!(snap.action.as_deref(), Some(SHED_ACTION));
            }
            other => panic!("expected Busy, got {other:?}"),
        }

        let second = engine.submit(req(RESTORE_ACTION, json!({}), true)).await.unwrap();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.job_id(), running);
        assert_ne!(second.job_id(), running);
        assert!(second.ok());
    }

    #[tokio::test]
    async fn dropped_caller_does_not_release_early() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = write_script(dir.path(), "shed.sh", "sleep 0.3");
        let engine = Engine::new(ActionRegistry::gpu_shed(&script));

        let caller = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(req(SHED_ACTION, json!({}), true)).await })
        };
        while !engine.snapshot().busy {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        caller.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(engine.admission().is_busy(), "job must keep running after caller leaves");

        let next = engine.submit(req(SHED_ACTION, json!({}), true)).await.unwrap();
        assert!(next.ok());
        assert!(!engine.snapshot().busy);
    }
}
