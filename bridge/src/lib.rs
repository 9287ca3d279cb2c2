#[macro_use]
extern crate tracing;

pub mod api;
pub mod config;
pub mod http;
pub mod session;
pub mod state;

pub use config::BridgeConfig;
pub use session::LocalSessionProvider;
pub use state::AppState;
