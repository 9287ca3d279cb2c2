//! Minimal illustration of the handler-process shape described in SPEC
//! §2.1: register functions, then branch on `Phase` — write a manifest and
//! exit during introspect, or enter the poll loop at runtime. Not part of
//! the bridge itself; this is what a real function author's `main` looks
//! like against `fn-bridge-runtime`.

use fn_bridge_runtime::manifest::{default_manifests_dir, ManifestEmitter};
use fn_bridge_runtime::registry::HandlerResult;
use fn_bridge_runtime::runtime_loop::RuntimeLoop;
use fn_bridge_runtime::{Environment, FunctionConfig, HandlerError, Phase, Registry};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, JsonSchema)]
struct EchoParams {
    message: String,
}

async fn echo(_context: Value, params: Value) -> HandlerResult {
    let params: EchoParams =
        serde_json::from_value(params).map_err(|err| HandlerError::known(err.to_string(), "InvalidParams"))?;
    Ok(serde_json::json!({ "message": params.message }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fn_bridge_runtime::log::init();

    let environment = Environment::from_process_env();
    let registry = Registry::new();
    let config = FunctionConfig {
        session_config: Default::default(),
        parameters_schema: Some(serde_json::to_value(schemars::schema_for!(EchoParams))?),
    };

    match environment.phase() {
        Phase::Introspect => {
            let emitter = ManifestEmitter::new(default_manifests_dir()?);
            emitter.register(&registry, "echo", config, echo)?;
            tracing::info!("wrote manifest for \"echo\"");
        }
        Phase::Runtime => {
            registry.register("echo", config, echo);
            tracing::info!(runtime_api = %environment.runtime_api(), "polling for invocations");
            RuntimeLoop::new(&environment, registry).run().await;
        }
    }

    Ok(())
}
