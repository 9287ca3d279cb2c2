//! External invoke endpoint: `POST /v1/functions/{name}/invoke` (§4.6).

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use fn_bridge_runtime::bridge::{InvokeOutcome, TriggerError};
use fn_bridge_runtime::session::SessionProvider;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::http::HttpError;
use crate::state::AppState;

/// Releases the session on every exit path (I5), including one the handler
/// future never reaches because the client disconnected: if `release()` is
/// never called explicitly, `Drop` spawns the release as a detached task.
struct SessionGuard {
    sessions: Arc<dyn SessionProvider>,
    id: Uuid,
    released: bool,
}

impl SessionGuard {
    fn new(sessions: Arc<dyn SessionProvider>, id: Uuid) -> Self {
        Self {
            sessions,
            id,
            released: false,
        }
    }

    async fn release(mut self) {
        self.released = true;
        if let Err(err) = self.sessions.release(self.id).await {
            tracing::warn!(error = %err, session_id = %self.id, "failed to release session");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let sessions = Arc::clone(&self.sessions);
        let id = self.id;
        tokio::spawn(async move {
            if let Err(err) = sessions.release(id).await {
                tracing::warn!(error = %err, session_id = %id, "failed to release session after the request was abandoned");
            }
        });
    }
}

pub async fn invoke(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, HttpError> {
    let body = body.map_err(|_| HttpError::bad_request().msg("request body must be a JSON object"))?.0;
    let body = body.as_object().cloned().unwrap_or_default();
    let params = body.get("params").cloned().unwrap_or_else(|| json!({}));
    let context_override = body.get("context").cloned();

    eprintln!("DEBUG invoke name={:?} manifests_len={}", name, state.manifests.len());
    let manifest = state
        .manifests
        .get(&name)
        .ok_or_else(|| HttpError::not_found().msg("Function not found in registry"))?;

    let session_config = manifest.config.session_config.clone().unwrap_or_default();
    let session = state
        .sessions
        .create(&session_config)
        .await
        .map_err(HttpError::internal().with_msg("Failed to create browser session").err())?;

    let guard = SessionGuard::new(Arc::clone(&state.sessions), session.id);
    let context = build_context(context_override, &session);

    let invoke_rx = match state.bridge.trigger(name, params, context) {
        Ok(rx) => rx,
        Err(err) => {
            guard.release().await;
            let message = match err {
                TriggerError::NoRuntimeConnected => "No runtime connected",
                TriggerError::InvocationInProgress => "Another invocation is in progress",
            };
            return Err(HttpError::unavailable().msg(message));
        }
    };

    let outcome = invoke_rx
        .await
        .map_err(|_| HttpError::internal().msg("invocation was dropped before it completed"))?;
    guard.release().await;

    Ok(match outcome {
        InvokeOutcome::Success(result) => Json(result).into_response(),
        InvokeOutcome::Error(error) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": {
                    "message": error.error_message,
                    "type": error.error_type,
                    "stackTrace": error.stack_trace,
                }
            })),
        )
            .into_response(),
    })
}

fn build_context(body_context: Option<Value>, session: &fn_bridge_runtime::session::Session) -> Value {
    let mut context = body_context.unwrap_or_else(|| {
        json!({
            "invocation": { "id": Uuid::new_v4(), "region": "local" },
        })
    });

    let session_value = serde_json::to_value(session).expect("Session always serializes");
    match context {
        Value::Object(ref mut map) => {
            map.insert("session".to_owned(), session_value);
        }
        _ => context = json!({ "session": session_value }),
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_context_is_kept_but_session_is_always_forced() {
        let session = fn_bridge_runtime::session::Session {
            id: Uuid::nil(),
            connect_url: "ws://x/session/nil".into(),
        };
        let context = build_context(Some(json!({"invocation": {"id": "caller-chosen"}, "session": "stale"})), &session);
        assert_eq!(context["invocation"]["id"], json!("caller-chosen"));
        assert_eq!(context["session"]["id"], json!(Uuid::nil()));
    }

    #[test]
    fn missing_body_context_synthesizes_one() {
        let session = fn_bridge_runtime::session::Session {
            id: Uuid::nil(),
            connect_url: "ws://x/session/nil".into(),
        };
        let context = build_context(None, &session);
        assert_eq!(context["invocation"]["region"], json!("local"));
        assert_eq!(context["session"]["connectUrl"], json!("ws://x/session/nil"));
    }
}
