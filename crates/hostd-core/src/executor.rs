//! Runs a derived [`Invocation`] to completion and captures its output.
//!
//! No timeout is imposed here. Actions manage their own deadlines through
//! the environment overrides their builders inject.

use crate::action::Invocation;
use crate::error::{HostdError, Result};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.rc == 0
    }
}

/// Verify the target exists, then spawn it with the environment overlay and
/// wait for it to exit. A non-zero exit is a normal result, not an error.
pub async fn run_invocation(inv: &Invocation) -> Result<ProcessOutput> {
    if !inv.program.exists() {
        return Err(HostdError::ActionTargetMissing(inv.program.clone()));
    }

    let output = Command::new(&inv.program)
        .args(&inv.args)
        .envs(&inv.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| HostdError::Spawn {
            program: inv.program.clone(),
            source,
        })?;

    Ok(ProcessOutput {
        rc: exit_code(output.status),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Exit code, or the negated signal number when killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return -sig;
        }
    }
    -1
}
