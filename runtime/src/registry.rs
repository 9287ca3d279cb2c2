//! Function registry: a process-wide, idempotent-by-name map from function
//! name to `{handler, config}`.
//!
//! Grounded on the gateway's `JetAssociationsMap` (`Mutex<HashMap<...>>`
//! behind a handle type) for the concurrency shape, simplified here to a
//! `parking_lot::Mutex` around a plain `HashMap` since registration always
//! happens before the runtime loop starts reading and there is no need for a
//! richer actor.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::HandlerError;

pub type HandlerResult = Result<Value, HandlerError>;
type BoxFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
type HandlerFn = dyn Fn(Value, Value) -> BoxFuture + Send + Sync;

/// Per-function configuration forwarded to the session provider and, when
/// present, used to validate invocation parameters before the handler runs.
#[derive(Clone, Default)]
pub struct FunctionConfig {
    pub session_config: serde_json::Map<String, Value>,
    /// JSON Schema describing `params`. Authors normally produce this with
    /// `schemars::schema_for!` on a typed params struct and serialize it to a
    /// `Value`; the registry does not care how it was produced.
    pub parameters_schema: Option<Value>,
}

struct Entry {
    config: FunctionConfig,
    handler: Arc<HandlerFn>,
    validator: Option<jsonschema::Validator>,
}

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("function {0:?} not found in registry")]
    FunctionNotFound(String),
    #[error("params failed schema validation: {0}")]
    InvalidParams(String),
}

/// Process-wide handler registry. Cheaply cloneable; clones share the same
/// underlying map.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `name`. Last registration wins; the
    /// map never grows for a name already present (invariant I6/P7).
    pub fn register<F, Fut>(&self, name: impl Into<String>, config: FunctionConfig, handler: F)
    where
        F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let validator = config
            .parameters_schema
            .as_ref()
            .and_then(|schema| jsonschema::validator_for(schema).ok());

        let entry = Entry {
            config,
            handler: Arc::new(move |context, params| Box::pin(handler(context, params))),
            validator,
        };

        self.entries.lock().insert(name.into(), entry);
    }

    /// Number of distinct registered names.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    pub fn config_of(&self, name: &str) -> Option<FunctionConfig> {
        self.entries.lock().get(name).map(|entry| entry.config.clone())
    }

    /// Looks up `name`, validates `params` against its schema if any, then
    /// invokes the handler with `(context, params)`.
    pub async fn execute(&self, name: &str, context: Value, params: Value) -> Result<HandlerResult, RegistryError> {
        let (handler, validation) = {
            let entries = self.entries.lock();
            let entry = entries
                .get(name)
                .ok_or_else(|| RegistryError::FunctionNotFound(name.to_owned()))?;

            let validation = entry
                .validator
                .as_ref()
                .and_then(|schema| schema.validate(&params).err().map(|error| error.to_string()));

            (Arc::clone(&entry.handler), validation)
        };

        if let Some(message) = validation {
            return Err(RegistryError::InvalidParams(message));
        }

        Ok(handler(context, params).await)
    }
}
