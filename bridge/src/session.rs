//! Default [`SessionProvider`]: synthesizes a session with no network call.
//!
//! Grounded on the gateway's preference for a narrow, injectable collaborator
//! (`SessionManagerHandle`) over a hardcoded network client (§4.7.1): a real
//! provider is a drop-in replacement implementing the same trait.

use async_trait::async_trait;
use fn_bridge_runtime::session::{Session, SessionError, SessionProvider};
use serde_json::Value;
use uuid::Uuid;

pub struct LocalSessionProvider {
    port: u16,
}

impl LocalSessionProvider {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SessionProvider for LocalSessionProvider {
    async fn create(&self, _config: &serde_json::Map<String, Value>) -> Result<Session, SessionError> {
        let id = Uuid::new_v4();
        Ok(Session {
            id,
            connect_url: format!("ws://127.0.0.1:{}/session/{id}", self.port),
        })
    }

    async fn release(&self, id: Uuid) -> Result<(), SessionError> {
        tracing::debug!(%id, "releasing local session (no-op)");
        Ok(())
    }
}
