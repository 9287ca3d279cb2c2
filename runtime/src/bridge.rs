//! Invocation Bridge: the hold-and-match long-poll rendezvous between the
//! external caller and the handler process.
//!
//! Grounded on the gateway's `JetAssociationsMap` (a single
//! `Mutex<HashMap<...>>` guarding every association transition) — here
//! simplified to a single `InvocationState` struct since there is at most
//! one invocation in flight at a time, not a map keyed by association id.
//! Held HTTP responses are modeled as `oneshot` channels: the handler awaits
//! its `Receiver` and the bridge resolves it from inside the lock, matching
//! §5's rule that held responses are only ever written while holding the
//! state mutex.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::RuntimeError;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);

pub const HEADER_REQUEST_ID: &str = "Lambda-Runtime-Aws-Request-Id";
pub const HEADER_DEADLINE_MS: &str = "Lambda-Runtime-Deadline-Ms";
pub const HEADER_FUNCTION_ARN: &str = "Lambda-Runtime-Invoked-Function-Arn";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeEventPayload {
    #[serde(rename = "functionName")]
    pub function_name: String,
    pub params: Value,
    pub context: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredInvocation {
    pub request_id: Uuid,
    pub deadline_ms: u64,
    pub function_arn: String,
    pub payload: RuntimeEventPayload,
}

/// What a held runtime-next long poll eventually resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum NextOutcome {
    Triggered(TriggeredInvocation),
    /// A second runtime connected and took this poll's place (I7).
    Preempted,
}

/// What a held external-invoke request eventually resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    Success(Value),
    Error(RuntimeError),
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("no runtime connected")]
    NoRuntimeConnected,
    #[error("another invocation is in progress")]
    InvocationInProgress,
}

struct HeldConnection<T> {
    sender: oneshot::Sender<T>,
    created_at: Instant,
}

#[derive(Default)]
struct InvocationState {
    next_conn: Option<HeldConnection<NextOutcome>>,
    invoke_conn: Option<HeldConnection<InvokeOutcome>>,
    current_request_id: Option<Uuid>,
    current_function_name: Option<String>,
    runtime_ever_connected: bool,
}

/// Process-wide rendezvous point. Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct InvocationBridge {
    state: Arc<Mutex<InvocationState>>,
    deadline: Duration,
}

impl Default for InvocationBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationBridge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InvocationState::default())),
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Test/tuning hook: a shorter deadline makes timeout behavior cheap to
    /// exercise without waiting out the real 300s window.
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(InvocationState::default())),
            deadline,
        }
    }

    /// Registers a runtime long-poll. If one was already held, it is
    /// preempted with [`NextOutcome::Preempted`] (I7). Returns the receiver
    /// to await, plus whether this is the first runtime connection observed
    /// by this bridge (used to trigger a one-time manifest reload).
    pub fn hold_next(&self) -> (oneshot::Receiver<NextOutcome>, bool) {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();

        if let Some(old) = state.next_conn.take() {
            tracing::debug!(age_ms = old.created_at.elapsed().as_millis(), "preempting held runtime-next connection");
            let _ = old.sender.send(NextOutcome::Preempted);
        }

        let first_connect = !state.runtime_ever_connected;
        state.runtime_ever_connected = true;
        state.next_conn = Some(HeldConnection {
            sender: tx,
            created_at: Instant::now(),
        });

        (rx, first_connect)
    }

    /// Attempts to start an invocation (I3). On success, consumes the held
    /// `nextConn`, completing it with the invocation payload, and arms a
    /// deadline timer per §5.1.
    pub fn trigger(&self, function_name: impl Into<String>, params: Value, context: Value) -> Result<oneshot::Receiver<InvokeOutcome>, TriggerError> {
        let function_name = function_name.into();
        let (tx, rx) = oneshot::channel();
        let request_id = Uuid::new_v4();

        {
            let mut state = self.state.lock();

            if state.invoke_conn.is_some() {
                return Err(TriggerError::InvocationInProgress);
            }

            let Some(next) = state.next_conn.take() else {
                return Err(TriggerError::NoRuntimeConnected);
            };

            let triggered = TriggeredInvocation {
                request_id,
                deadline_ms: now_millis() + self.deadline.as_millis() as u64,
                function_arn: synthetic_function_arn(&function_name),
                payload: RuntimeEventPayload {
                    function_name: function_name.clone(),
                    params,
                    context,
                },
            };

            state.current_request_id = Some(request_id);
            state.current_function_name = Some(function_name);
            state.invoke_conn = Some(HeldConnection {
                sender: tx,
                created_at: Instant::now(),
            });

            // The receiving end (the runtime-next handler) may already have
            // dropped its receiver if the client disconnected; that's fine,
            // the send is simply lost and the next completeWith* call below
            // will find no invokeConn waiting either.
            let _ = next.sender.send(NextOutcome::Triggered(triggered));
        }

        self.spawn_deadline_timer(request_id);
        Ok(rx)
    }

    fn spawn_deadline_timer(&self, request_id: Uuid) {
        let bridge = self.clone();
        let deadline = self.deadline;
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            bridge.timeout_invocation(request_id);
        });
    }

    fn timeout_invocation(&self, request_id: Uuid) {
        let mut state = self.state.lock();
        if state.current_request_id != Some(request_id) {
            return;
        }

        if let Some(conn) = state.invoke_conn.take() {
            tracing::warn!(%request_id, "invocation deadline elapsed without a runtime response");
            let error = RuntimeError {
                error_message: "Invocation timed out".to_owned(),
                error_type: "TimeoutError".to_owned(),
                stack_trace: Vec::new(),
            };
            let _ = conn.sender.send(InvokeOutcome::Error(error));
        }

        state.current_request_id = None;
        state.current_function_name = None;
    }

    pub fn complete_with_success(&self, request_id: Uuid, result: Value) -> bool {
        self.complete(request_id, InvokeOutcome::Success(result))
    }

    pub fn complete_with_error(&self, request_id: Uuid, error: RuntimeError) -> bool {
        self.complete(request_id, InvokeOutcome::Error(error))
    }

    fn complete(&self, request_id: Uuid, outcome: InvokeOutcome) -> bool {
        let mut state = self.state.lock();

        if state.current_request_id != Some(request_id) {
            return false;
        }

        let Some(conn) = state.invoke_conn.take() else {
            return false;
        };

        state.current_request_id = None;
        state.current_function_name = None;
        let _ = conn.sender.send(outcome);
        true
    }

    pub fn runtime_ever_connected(&self) -> bool {
        self.state.lock().runtime_ever_connected
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_millis() as u64
}

fn synthetic_function_arn(function_name: &str) -> String {
    format!("arn:aws:lambda:local:000000000000:function:{function_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn trigger_without_a_held_runtime_is_rejected() {
        let bridge = InvocationBridge::new();
        let err = bridge.trigger("echo", json!({}), json!({})).unwrap_err();
        assert!(matches!(err, TriggerError::NoRuntimeConnected));
    }

    #[tokio::test]
    async fn hold_then_trigger_delivers_the_payload_and_request_id() {
        let bridge = InvocationBridge::new();
        let (next_rx, first_connect) = bridge.hold_next();
        assert!(first_connect);

        let invoke_rx = bridge.trigger("echo", json!({"x": 1}), json!({"session": {"id": "s"}})).unwrap();

        let outcome = next_rx.await.unwrap();
        let NextOutcome::Triggered(triggered) = outcome else {
            panic!("expected Triggered");
        };
        assert_eq!(triggered.payload.function_name, "echo");
        assert_eq!(triggered.payload.params, json!({"x": 1}));

        assert!(bridge.complete_with_success(triggered.request_id, json!({"y": 2})));
        let invoke_outcome = invoke_rx.await.unwrap();
        assert_eq!(invoke_outcome, InvokeOutcome::Success(json!({"y": 2})));
    }

    #[tokio::test]
    async fn second_hold_next_preempts_the_first() {
        let bridge = InvocationBridge::new();
        let (first_rx, first_connect) = bridge.hold_next();
        let (_second_rx, second_connect) = bridge.hold_next();

        assert!(first_connect);
        assert!(!second_connect);
        assert_eq!(first_rx.await.unwrap(), NextOutcome::Preempted);
    }

    #[tokio::test]
    async fn trigger_while_invoking_is_rejected() {
        let bridge = InvocationBridge::new();
        let (_next_rx, _) = bridge.hold_next();
        let _invoke_rx = bridge.trigger("echo", json!({}), json!({})).unwrap();

        let err = bridge.trigger("echo", json!({}), json!({})).unwrap_err();
        assert!(matches!(err, TriggerError::InvocationInProgress));
    }

    #[tokio::test]
    async fn mismatched_request_id_is_rejected_without_disturbing_state() {
        let bridge = InvocationBridge::new();
        let (next_rx, _) = bridge.hold_next();
        let invoke_rx = bridge.trigger("echo", json!({}), json!({})).unwrap();
        let triggered = match next_rx.await.unwrap() {
            NextOutcome::Triggered(t) => t,
            _ => panic!("expected Triggered"),
        };

        assert!(!bridge.complete_with_success(Uuid::new_v4(), json!(null)));
        assert!(bridge.complete_with_success(triggered.request_id, json!(42)));
        assert_eq!(invoke_rx.await.unwrap(), InvokeOutcome::Success(json!(42)));
    }

    #[tokio::test]
    async fn holding_next_again_while_invoking_does_not_disturb_the_active_invocation() {
        let bridge = InvocationBridge::new();
        let (_first_next, _) = bridge.hold_next();
        let invoke_rx = bridge.trigger("echo", json!({}), json!({})).unwrap();

        let (second_next, second_connect) = bridge.hold_next();
        assert!(!second_connect);

        let current_request_id = bridge.state.lock().current_request_id.unwrap();
        assert!(bridge.complete_with_error(
            current_request_id,
            RuntimeError {
                error_message: "boom".into(),
                error_type: "Err".into(),
                stack_trace: vec![],
            }
        ));
        assert!(matches!(invoke_rx.await.unwrap(), InvokeOutcome::Error(_)));
        drop(second_next);
    }

    #[tokio::test]
    async fn deadline_elapsing_times_out_the_held_caller() {
        let bridge = InvocationBridge::with_deadline(Duration::from_millis(20));
        let (_next_rx, _) = bridge.hold_next();
        let invoke_rx = bridge.trigger("echo", json!({}), json!({})).unwrap();

        let outcome = invoke_rx.await.unwrap();
        match outcome {
            InvokeOutcome::Error(err) => assert_eq!(err.error_type, "TimeoutError"),
            other => panic!("expected timeout error, got {other:?}"),
        }
    }
}
