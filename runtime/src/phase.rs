//! Environment & phase selector.
//!
//! Snapshot taken once at process start; later mutation of the process
//! environment has no effect on an already-constructed [`Environment`].
//! Mirrors the gateway's `ConfHandle::init` shape (read once, hand out an
//! immutable value) without the hot-reload machinery this harness doesn't need.

use std::net::SocketAddr;

/// Fatal-error policy for the runtime loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// A system error is logged and the loop continues; used for interactive development.
    Local,
    /// A system error is logged and the process exits; the orchestrator is expected to recycle it.
    Production,
}

/// Which half of the split process model this invocation of the binary plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Long-running: poll the bridge and execute handlers.
    Runtime,
    /// One-shot: run registrations for their side effect (manifest emission) and exit.
    Introspect,
}

const DEFAULT_RUNTIME_API: &str = "127.0.0.1:14113";

#[derive(Debug, Clone)]
pub struct Environment {
    mode: RunMode,
    runtime_api: SocketAddr,
    phase: Phase,
}

impl Environment {
    /// Builds an `Environment` from already-resolved values, bypassing the
    /// process environment. Useful for embedding this crate in a process that
    /// has its own configuration layer, and for tests.
    pub fn new(mode: RunMode, runtime_api: SocketAddr, phase: Phase) -> Self {
        Self {
            mode,
            runtime_api,
            phase,
        }
    }

    /// Reads `NODE_ENV`, `AWS_LAMBDA_RUNTIME_API`, and `BB_FUNCTIONS_PHASE` from
    /// the process environment. Unset or unrecognized values fall back to the
    /// documented defaults rather than erroring, since this harness is meant
    /// to run with zero configuration out of the box.
    pub fn from_process_env() -> Self {
        Self::from_vars(
            std::env::var("NODE_ENV").ok(),
            std::env::var("AWS_LAMBDA_RUNTIME_API").ok(),
            std::env::var("BB_FUNCTIONS_PHASE").ok(),
        )
    }

    fn from_vars(node_env: Option<String>, runtime_api: Option<String>, phase: Option<String>) -> Self {
        let mode = match node_env.as_deref() {
            Some("production") => RunMode::Production,
            _ => RunMode::Local,
        };

        let runtime_api = runtime_api
            .as_deref()
            .and_then(|addr| addr.parse().ok())
            .unwrap_or_else(|| DEFAULT_RUNTIME_API.parse().expect("default address is valid"));

        let phase = match phase.as_deref() {
            Some("introspect") => Phase::Introspect,
            _ => Phase::Runtime,
        };

        Self {
            mode,
            runtime_api,
            phase,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn runtime_api(&self) -> SocketAddr {
        self.runtime_api
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}
