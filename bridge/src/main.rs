#[macro_use]
extern crate tracing;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use fn_bridge_runtime::{InvocationBridge, ManifestStore};
use fn_bridge_server::{AppState, BridgeConfig, LocalSessionProvider};
use fn_task::{ShutdownHandle, ShutdownSignal, Task};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fn_bridge_runtime::log::init();

    let config = BridgeConfig::from_process_env().context("failed to load configuration")?;

    let manifests = ManifestStore::new(config.manifests_dir.clone());
    manifests.load().await.context("failed to load manifests")?;

    let state = AppState {
        bridge: InvocationBridge::new(),
        manifests,
        sessions: Arc::new(LocalSessionProvider::new(config.bind_addr.port())),
    };

    let router = fn_bridge_server::api::make_router(state);
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "bridge listening");

    let (shutdown, shutdown_signal) = ShutdownHandle::new();
    let server = fn_task::spawn_task(HttpListener { listener, router }, shutdown_signal);

    wait_for_os_shutdown_signal().await;
    info!("shutdown signal received");
    shutdown.signal();

    server.join().await.context("http listener task panicked")??;
    Ok(())
}

/// The bridge's sole long-running task: the axum server, made to cooperate
/// with shutdown instead of being aborted out from under an in-flight
/// request (see [`fn_task::Task`]).
struct HttpListener {
    listener: TcpListener,
    router: Router,
}

impl Task for HttpListener {
    type Output = anyhow::Result<()>;

    const NAME: &'static str = "bridge-http-listener";

    fn run(self, mut shutdown_signal: ShutdownSignal) -> impl Future<Output = Self::Output> + Send {
        async move {
            axum::serve(self.listener, self.router.into_make_service())
                .with_graceful_shutdown(async move { shutdown_signal.wait().await })
                .await
                .context("server task failed")
        }
    }
}

async fn wait_for_os_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let Ok(mut terminate) = signal(SignalKind::terminate()) else {
        let _ = tokio::signal::ctrl_c().await;
        return;
    };
    let Ok(mut interrupt) = signal(SignalKind::interrupt()) else {
        let _ = tokio::signal::ctrl_c().await;
        return;
    };

    tokio::select! {
        _ = terminate.recv() => {}
        _ = interrupt.recv() => {}
    }
}
