use std::sync::Arc;

use fn_bridge_runtime::{InvocationBridge, ManifestStore, SessionProvider};

/// Shared axum state, grounded on the gateway's `DgwState` (one `Clone`able
/// struct of handles, not a god object — each field owns exactly the
/// collaborator a handler needs).
#[derive(Clone)]
pub struct AppState {
    pub bridge: InvocationBridge,
    pub manifests: ManifestStore,
    pub sessions: Arc<dyn SessionProvider>,
}
