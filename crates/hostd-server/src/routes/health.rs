use axum::Json;
use serde_json::{json, Value};

/// GET /v1/health: liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
