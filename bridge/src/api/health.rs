use axum::Json;
use serde_json::{json, Value};

/// Liveness probe: always 200, no state consulted (§4.6).
pub(super) async fn get_health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
