mod health;
mod invoke;
mod runtime;

use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

fn make_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any)
}

pub fn make_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::get_health))
        .route("/v1/functions/{name}/invoke", post(invoke::invoke))
        .route("/2018-06-01/runtime/invocation/next", get(runtime::get_next))
        .route("/2018-06-01/runtime/invocation/{request_id}/response", post(runtime::post_response))
        .route("/2018-06-01/runtime/invocation/{request_id}/error", post(runtime::post_error))
        .fallback(not_found)
        .layer(make_cors())
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
