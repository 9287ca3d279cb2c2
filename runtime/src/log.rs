//! Logging bootstrap.
//!
//! Mirrors the gateway's init-once-at-startup approach (`devolutions-log`)
//! but without the rolling-file-appender and guard-drop machinery that harness
//! doesn't need: stderr, `RUST_LOG`-driven filtering, one call at the top of
//! `main`.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the global tracing subscriber. Safe to call at most once per
/// process; a second call is a logic error in the caller, not something this
/// function tries to paper over.
pub fn init() {
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
