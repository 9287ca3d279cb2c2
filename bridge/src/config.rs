//! Bridge-specific configuration: just the two knobs this binary owns.
//!
//! Grounded on the gateway's env-first, fallback-to-default `config.rs`
//! shape, trimmed down to the handful of settings this harness actually has.

use std::net::SocketAddr;

use camino::Utf8PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:14113";

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub bind_addr: SocketAddr,
    pub manifests_dir: Utf8PathBuf,
}

impl BridgeConfig {
    pub fn from_process_env() -> anyhow::Result<Self> {
        let bind_addr = resolve_bind_addr(std::env::var("FN_BRIDGE_BIND_ADDR").ok());
        let manifests_dir = fn_bridge_runtime::manifest::default_manifests_dir()?;
        Ok(Self { bind_addr, manifests_dir })
    }
}

fn resolve_bind_addr(bind_addr_env: Option<String>) -> SocketAddr {
    bind_addr_env
        .as_deref()
        .and_then(|addr| addr.parse().ok())
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.parse().expect("default bind address is valid"))
}
