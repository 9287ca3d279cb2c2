//! Shared library linked by both the bridge server and a function handler
//! process: the function registry, the manifest emitter/store, the runtime
//! poll loop, and the error normalizer that turns a handler failure into the
//! wire-level [`error::RuntimeError`] shape.

pub mod bridge;
pub mod error;
pub mod log;
pub mod manifest;
pub mod phase;
pub mod registry;
pub mod runtime_loop;
pub mod session;

pub use bridge::InvocationBridge;
pub use error::{HandlerError, RuntimeError};
pub use manifest::{ManifestEmitter, ManifestStore};
pub use phase::{Environment, Phase};
pub use registry::{FunctionConfig, Registry};
pub use session::{Session, SessionError, SessionProvider};
