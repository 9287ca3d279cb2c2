//! Session provider abstraction.
//!
//! The bridge creates a session before triggering a handler and releases it
//! on every terminal path (success, handler error, or timeout). This module
//! only defines the seam; the default, dependency-free implementation
//! (`LocalSessionProvider`) lives in the `bridge` crate next to the rest of
//! the wiring it's specific to.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub id: Uuid,
    #[serde(rename = "connectUrl")]
    pub connect_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to create session: {0}")]
    Create(#[source] anyhow::Error),
    #[error("failed to release session {id}: {source}")]
    Release { id: Uuid, #[source] source: anyhow::Error },
}

/// Creates and tears down the browser session a function handler runs
/// against. `config` is the function's `sessionConfig`, forwarded verbatim.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn create(&self, config: &serde_json::Map<String, Value>) -> Result<Session, SessionError>;
    async fn release(&self, id: Uuid) -> Result<(), SessionError>;
}
