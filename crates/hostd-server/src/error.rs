use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hostd_core::HostdError;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Internal sentinel for 404s
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 404 through the `anyhow::Error` chain without
/// adding a routing concern to `HostdError`.
#[derive(Debug)]
struct NotFoundError;

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "not found")
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Every body carries `ok: false`
/// and a machine-readable `error` code.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn not_found() -> Self {
        Self(NotFoundError.into())
    }
}

fn hostd_error_response(e: &HostdError) -> (StatusCode, Value) {
    match e {
        HostdError::UnknownAction(action) => (
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error": "unknown_action", "action": action }),
        ),
        HostdError::ArgsMustBeObject => (
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error": "args_must_be_object" }),
        ),
        HostdError::BadJson(detail) => (
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error": "bad_json", "detail": detail }),
        ),
        HostdError::InvalidArgs { action, detail } => (
            StatusCode::BAD_REQUEST,
            json!({ "ok": false, "error": "invalid_args", "action": action, "detail": detail }),
        ),
        HostdError::Busy(snapshot) => {
            let mut body = serde_json::to_value(snapshot).unwrap_or_else(|_| json!({}));
            if let Value::Object(map) = &mut body {
                map.insert("ok".into(), Value::Bool(false));
                map.insert("error".into(), Value::from("busy"));
            }
            (StatusCode::CONFLICT, body)
        }
        HostdError::ActionTargetMissing(_)
        | HostdError::Spawn { .. }
        | HostdError::JobPanicked(_)
        | HostdError::InvalidSocketMode(_)
        | HostdError::ConfigNotFound(_)
        | HostdError::Io(_)
        | HostdError::Yaml(_)
        | HostdError::Json(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "ok": false, "error": "exception", "detail": e.to_string() }),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.0.downcast_ref::<NotFoundError>().is_some() {
            let body = json!({ "ok": false, "error": "not_found" });
            return (StatusCode::NOT_FOUND, axum::Json(body)).into_response();
        }

        let (status, body) = match self.0.downcast_ref::<HostdError>() {
            Some(e) => hostd_error_response(e),
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "ok": false, "error": "exception", "detail": format!("{:#}", self.0) }),
            ),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
