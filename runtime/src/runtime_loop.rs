//! Handler-side polling loop.
//!
//! One cooperative task: long-poll `/invocation/next`, execute the matching
//! registered handler, POST the outcome. Grounded on the Runtime API proxy
//! shape from the retrieval pack's failure-lambda layer (`next` / `response`
//! / `error` against a base URL taken from `AWS_LAMBDA_RUNTIME_API`), redone
//! with `reqwest` and the registry/error types this crate already defines.

use serde_json::Value;

use crate::bridge::{RuntimeEventPayload, HEADER_DEADLINE_MS, HEADER_FUNCTION_ARN, HEADER_REQUEST_ID};
use crate::error::{normalize, HandlerError, RuntimeError};
use crate::phase::{Environment, RunMode};
use crate::registry::{Registry, RegistryError};

const NEXT_PATH: &str = "/2018-06-01/runtime/invocation/next";

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("failed to poll for the next invocation: {0}")]
    Poll(#[source] reqwest::Error),
    #[error("next-invocation response carried no {HEADER_REQUEST_ID} header")]
    MissingRequestId,
    #[error("failed to parse invocation event body: {0}")]
    Parse(#[source] reqwest::Error),
    #[error("function {0:?} is not registered")]
    UnknownFunction(String),
    #[error("failed to post invocation outcome: {0}")]
    PostOutcome(#[source] reqwest::Error),
}

/// Polls `runtimeApi`, dispatches to `registry`, and reports outcomes back.
pub struct RuntimeLoop {
    client: reqwest::Client,
    base_url: String,
    registry: Registry,
    mode: RunMode,
}

impl RuntimeLoop {
    pub fn new(environment: &Environment, registry: Registry) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{}", environment.runtime_api()),
            registry,
            mode: environment.mode(),
        }
    }

    /// Runs forever under normal operation. In [`RunMode::Production`] a
    /// system error terminates the process (the orchestrator is expected to
    /// recycle it); in [`RunMode::Local`] it is logged and the loop continues.
    pub async fn run(&self) -> ! {
        loop {
            if let Err(err) = self.run_once().await {
                tracing::error!(error = %err, "system error in runtime loop");
                if self.mode == RunMode::Production {
                    std::process::exit(1);
                }
            }
        }
    }

    /// One iteration: GET next, execute, POST outcome. Exposed separately so
    /// tests can drive a bounded number of iterations against a mock server.
    pub async fn run_once(&self) -> Result<(), SystemError> {
        let (request_id, event) = self.poll_next().await?;

        match self.registry.execute(&event.function_name, event.context, event.params).await {
            Ok(Ok(result)) => self.post_response(&request_id, result).await,
            Ok(Err(handler_error)) => self.post_error(&request_id, &handler_error).await,
            Err(RegistryError::FunctionNotFound(name)) => Err(SystemError::UnknownFunction(name)),
            Err(RegistryError::InvalidParams(message)) => {
                // Per the registry contract, a schema validation failure is a
                // USER error: it is reported to the caller like any other
                // handler failure, not treated as a loop-fatal system error.
                let handler_error = HandlerError::known(message, "ValidationError");
                self.post_error(&request_id, &handler_error).await
            }
        }
    }

    async fn poll_next(&self) -> Result<(String, RuntimeEventPayload), SystemError> {
        let response = self
            .client
            .get(format!("{}{NEXT_PATH}", self.base_url))
            .send()
            .await
            .map_err(SystemError::Poll)?;

        let request_id = response
            .headers()
            .get(HEADER_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .ok_or(SystemError::MissingRequestId)?;

        // Advertised but not otherwise consulted here: the deadline is
        // enforced bridge-side (§5.1); the handler process only needs the
        // request id to report its outcome against.
        let _deadline_ms = response.headers().get(HEADER_DEADLINE_MS);
        let _function_arn = response.headers().get(HEADER_FUNCTION_ARN);

        let event = response.json::<RuntimeEventPayload>().await.map_err(SystemError::Parse)?;
        Ok((request_id, event))
    }

    async fn post_response(&self, request_id: &str, result: Value) -> Result<(), SystemError> {
        self.client
            .post(format!("{}/2018-06-01/runtime/invocation/{request_id}/response", self.base_url))
            .json(&result)
            .send()
            .await
            .map_err(SystemError::PostOutcome)?;
        Ok(())
    }

    async fn post_error(&self, request_id: &str, error: &HandlerError) -> Result<(), SystemError> {
        let runtime_error: RuntimeError = normalize(error);
        self.client
            .post(format!("{}/2018-06-01/runtime/invocation/{request_id}/error", self.base_url))
            .json(&runtime_error)
            .send()
            .await
            .map_err(SystemError::PostOutcome)?;
        Ok(())
    }
}
