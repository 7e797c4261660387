use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hostd_core::engine::{JobOutcome, RunRequest};
use hostd_core::HostdError;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request parsing
// ---------------------------------------------------------------------------

/// `wait` defaults to blocking; only a literal `0` opts out.
fn parse_wait(query: &[(String, String)]) -> bool {
    query
        .iter()
        .find(|(k, _)| k == "wait")
        .map(|(_, v)| v.trim() != "0")
        .unwrap_or(true)
}

/// Parse `{action, args}`. An empty body is `{}`. A missing `args` means
/// `{}`; any other non-object value, `null` included, is rejected before the
/// action name is checked.
fn parse_run_body(body: &[u8], wait: bool) -> Result<RunRequest, HostdError> {
    let value: Value = if body.is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(body).map_err(|e| HostdError::BadJson(e.to_string()))?
    };
    let Value::Object(mut obj) = value else {
        return Err(HostdError::BadJson(
            "request body must be a JSON object".into(),
        ));
    };

    let args = match obj.remove("args") {
        None => Map::new(),
        Some(Value::Object(m)) => m,
        Some(_) => return Err(HostdError::ArgsMustBeObject),
    };
    let action = match obj.remove("action") {
        Some(Value::String(s)) => s,
        Some(other) => return Err(HostdError::UnknownAction(other)),
        None => return Err(HostdError::UnknownAction(Value::Null)),
    };

    Ok(RunRequest { action, args, wait })
}

// ---------------------------------------------------------------------------
// POST /v1/run
// ---------------------------------------------------------------------------

/// POST /v1/run?wait={0|1}: run a registered action under single-flight
/// admission.
///
/// Returns 200 with the captured output once the process exits (`ok` is
/// false for a non-zero exit code).
/// Returns 400 for bad JSON, non-object `args`, unknown actions, or
/// arguments that fail validation.
/// Returns 409 with the busy snapshot when `wait=0` and a job is running.
/// Returns 500 when the job was admitted but could not be run.
pub async fn run_action(
    State(app): State<AppState>,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let req = parse_run_body(&body, parse_wait(&query))?;

    let response = match app.engine.submit(req).await? {
        JobOutcome::Completed(report) => (StatusCode::OK, Json(report)).into_response(),
        JobOutcome::Failed(failure) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(failure)).into_response()
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn wait_defaults_to_blocking() {
        assert!(parse_wait(&q(&[])));
        assert!(parse_wait(&q(&[("wait", "1")])));
        assert!(parse_wait(&q(&[("wait", "")])));
        assert!(parse_wait(&q(&[("wait", "no")])));
        assert!(!parse_wait(&q(&[("wait", " 0 ")])));
        assert!(!parse_wait(&q(&[("wait", "0"), ("wait", "1")])));
    }

    #[test]
    fn empty_body_has_no_action() {
        let err = parse_run_body(b"", true).unwrap_err();
        assert!(matches!(err, HostdError::UnknownAction(Value::Null)));
    }

    #[test]
    fn malformed_body_is_bad_json() {
        assert!(matches!(
            parse_run_body(b"{not json", true).unwrap_err(),
            HostdError::BadJson(_)
        ));
        assert!(matches!(
            parse_run_body(b"[1,2]", true).unwrap_err(),
            HostdError::BadJson(_)
        ));
    }

    #[test]
    fn args_checked_before_action() {
        let err = parse_run_body(br#"{"action":"nope","args":[1]}"#, true).unwrap_err();
        assert!(matches!(err, HostdError::ArgsMustBeObject));
    }

    #[test]
    fn null_args_is_rejected() {
        let err = parse_run_body(br#"{"action":"gpu_shed.restore","args":null}"#, true).unwrap_err();
        assert!(matches!(err, HostdError::ArgsMustBeObject));
    }

    #[test]
    fn missing_args_is_empty_object() {
        let req = parse_run_body(br#"{"action":"gpu_shed.restore"}"#, false).unwrap();
        assert_eq!(req.action, "gpu_shed.restore");
        assert!(req.args.is_empty());
        assert!(!req.wait);
    }

    #[test]
    fn non_string_action_is_echoed_as_sent() {
        let err = parse_run_body(br#"{"action":5}"#, true).unwrap_err();
        assert!(matches!(err, HostdError::UnknownAction(ref v) if *v == Value::from(5)));
        let err = parse_run_body(br#"{"action":["a"]}"#, true).unwrap_err();
        assert!(matches!(err, HostdError::UnknownAction(Value::Array(_))));
    }
}
