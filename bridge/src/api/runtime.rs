//! Runtime-side endpoints: the handler process's long poll and its two
//! outcome posts (§4.6).

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use fn_bridge_runtime::bridge::{NextOutcome, HEADER_DEADLINE_MS, HEADER_FUNCTION_ARN, HEADER_REQUEST_ID};
use fn_bridge_runtime::RuntimeError;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::http::HttpError;
use crate::state::AppState;

pub async fn get_next(State(state): State<AppState>) -> Response {
    let (rx, first_connect) = state.bridge.hold_next();

    if first_connect {
        let manifests = state.manifests.clone();
        tokio::spawn(async move {
            if let Err(err) = manifests.load().await {
                tracing::warn!(error = %err, "failed to reload manifests after the first runtime connect");
            }
        });
    }

    match rx.await {
        Ok(NextOutcome::Triggered(triggered)) => {
            let mut headers = HeaderMap::new();
            headers.insert(HEADER_REQUEST_ID, header_value(&triggered.request_id.to_string()));
            headers.insert(HEADER_DEADLINE_MS, header_value(&triggered.deadline_ms.to_string()));
            headers.insert(HEADER_FUNCTION_ARN, header_value(&triggered.function_arn));
            (StatusCode::OK, headers, Json(triggered.payload)).into_response()
        }
        Ok(NextOutcome::Preempted) => HttpError::unavailable().msg("Another runtime connected").into_response(),
        Err(_) => HttpError::internal().msg("runtime connection was dropped before it was resolved").into_response(),
    }
}

pub async fn post_response(State(state): State<AppState>, Path(request_id): Path<String>, body: Bytes) -> Result<Response, HttpError> {
    let request_id = parse_request_id(&request_id)?;
    let result = parse_json_or_empty_object(&body)?;

    if state.bridge.complete_with_success(request_id, result) {
        Ok(accepted())
    } else {
        Err(HttpError::bad_request().msg("request id does not match the active invocation"))
    }
}

pub async fn post_error(State(state): State<AppState>, Path(request_id): Path<String>, body: Bytes) -> Result<Response, HttpError> {
    let request_id = parse_request_id(&request_id)?;
    let error: RuntimeError =
        serde_json::from_slice(&body).map_err(|_| HttpError::bad_request().msg("body must be {errorMessage, errorType, stackTrace}"))?;

    if state.bridge.complete_with_error(request_id, error) {
        Ok(accepted())
    } else {
        Err(HttpError::bad_request().msg("request id does not match the active invocation"))
    }
}

fn accepted() -> Response {
    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))).into_response()
}

fn parse_request_id(raw: &str) -> Result<Uuid, HttpError> {
    raw.parse().map_err(|_| HttpError::bad_request().msg("invocation id must be a UUID"))
}

fn parse_json_or_empty_object(body: &[u8]) -> Result<Value, HttpError> {
    if body.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|_| HttpError::bad_request().msg("invalid JSON body"))
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""))
}
