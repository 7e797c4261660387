use crate::busy::BusySnapshot;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostdError {
    /// Carries the `action` value exactly as the caller sent it.
    #[error("unknown action: {}", describe_action(.0))]
    UnknownAction(Value),

    #[error("args must be an object")]
    ArgsMustBeObject,

    #[error("bad json: {0}")]
    BadJson(String),

    #[error("invalid args for '{action}': {detail}")]
    InvalidArgs { action: String, detail: String },

    #[error("busy: job {} is running", .0.job_id.as_deref().unwrap_or("<unknown>"))]
    Busy(BusySnapshot),

    #[error("action target missing: {}", .0.display())]
    ActionTargetMissing(PathBuf),

    #[error("failed to spawn '{}': {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("job task failed: {0}")]
    JobPanicked(String),

    #[error("invalid socket mode '{0}': must be an octal permission string")]
    InvalidSocketMode(String),

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn describe_action(action: &Value) -> String {
    match action {
        Value::Null => "<none>".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, HostdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_target_message_names_the_path() {
        let err = HostdError::ActionTargetMissing(PathBuf::from("/opt/nope.sh"));
        assert!(err.to_string().contains("/opt/nope.sh"));
    }

    #[test]
    fn unknown_action_renders_what_was_sent() {
        let err = HostdError::UnknownAction(Value::Null);
        assert_eq!(err.to_string(), "unknown action: <none>");
        let err = HostdError::UnknownAction(Value::from("gpu_shed.x"));
        assert_eq!(err.to_string(), "unknown action: gpu_shed.x");
        let err = HostdError::UnknownAction(Value::from(5));
        assert_eq!(err.to_string(), "unknown action: 5");
    }
}
