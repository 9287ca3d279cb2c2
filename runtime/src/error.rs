//! Closed-sum error normalization.
//!
//! The source protocol this harness emulates lets a handler throw an
//! arbitrary, duck-typed value. Rust has no equivalent, so [`HandlerError`]
//! gives handlers a closed choice instead: report a known `{message, type,
//! stack}` triple, or hand back any [`anyhow::Error`] and let [`normalize`]
//! fill in the documented fallbacks.

use serde::{Deserialize, Serialize};

/// What a handler returns on failure.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The handler already knows its error shape.
    #[error("{message}")]
    Known {
        message: String,
        error_type: String,
        stack: Vec<String>,
    },
    /// Anything else — a library error, a panic payload converted upstream, etc.
    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn known(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        HandlerError::Known {
            message: message.into(),
            error_type: error_type.into(),
            stack: Vec::new(),
        }
    }
}

/// Wire shape POSTed by the runtime loop to `/invocation/{id}/error`, and
/// relayed by the bridge to the external caller under `error.*`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeError {
    pub error_message: String,
    pub error_type: String,
    pub stack_trace: Vec<String>,
}

const FALLBACK_MESSAGE: &str = "An unknown error occurred";
const FALLBACK_TYPE: &str = "UnknownError";

/// Normalizes a handler failure into the three required fields, applying the
/// fallbacks the distillation documents: an empty message becomes
/// [`FALLBACK_MESSAGE`], a missing type becomes [`FALLBACK_TYPE`], and a
/// single multi-line string is split on `\n` into a stack array (the source
/// splits on the literal two-character sequence `/n`, which only works by
/// accident; this implementation splits on real newlines instead).
pub fn normalize(error: &HandlerError) -> RuntimeError {
    match error {
        HandlerError::Known {
            message,
            error_type,
            stack,
        } => RuntimeError {
            error_message: non_empty(message).unwrap_or(FALLBACK_MESSAGE).to_owned(),
            error_type: non_empty(error_type).unwrap_or(FALLBACK_TYPE).to_owned(),
            stack_trace: stack.clone(),
        },
        HandlerError::Unknown(source) => {
            let message = source.to_string();
            let debug_repr = format!("{source:?}");
            RuntimeError {
                error_message: non_empty(&message).unwrap_or(FALLBACK_MESSAGE).to_owned(),
                error_type: FALLBACK_TYPE.to_owned(),
                stack_trace: debug_repr.lines().map(str::to_owned).collect(),
            }
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(s)
    }
}
