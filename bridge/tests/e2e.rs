#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use fn_bridge_runtime::manifest::{ManifestEmitter, ManifestStore};
use fn_bridge_runtime::registry::FunctionConfig;
use fn_bridge_runtime::{InvocationBridge, Registry};
use fn_bridge_server::{AppState, LocalSessionProvider};
use serde_json::json;

async fn spawn_bridge(manifests: ManifestStore) -> String {
    let state = AppState {
        bridge: InvocationBridge::new(),
        manifests,
        sessions: Arc::new(LocalSessionProvider::new(0)),
    };
    let router = fn_bridge_server::api::make_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.unwrap();
    });

    format!("http://{addr}")
}

async fn manifests_with(name: &str, config: FunctionConfig) -> ManifestStore {
    let dir = tempfile::tempdir().unwrap();
    let dir = camino::Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap();
    let registry = Registry::new();
    let emitter = ManifestEmitter::new(dir.clone());
    emitter
        .register(&registry, name, config, |_context, params| async move { Ok(params) })
        .unwrap();

    let store = ManifestStore::new(dir.clone());
    store.load().await.unwrap();
    eprintln!("DEBUG manifests_with dir={dir} len={} entries={:?}", store.len(), std::fs::read_dir(&dir).unwrap().map(|e| e.unwrap().path()).collect::<Vec<_>>());
    store
}

#[tokio::test]
async fn happy_path_round_trips_a_result_and_releases_the_session_once() {
    let manifests = manifests_with("echo", FunctionConfig::default()).await;
    let base_url = spawn_bridge(manifests).await;
    let client = reqwest::Client::new();

    let next_url = base_url.clone();
    let next_handle = tokio::spawn(async move {
        let client = reqwest::Client::new();
        let response = client
            .get(format!("{next_url}/2018-06-01/runtime/invocation/next"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let request_id = response.headers().get("Lambda-Runtime-Aws-Request-Id").unwrap().to_str().unwrap().to_owned();
        let payload: serde_json::Value = response.json().await.unwrap();
        assert_eq!(payload["functionName"], json!("echo"));
        assert_eq!(payload["params"], json!({"x": 1}));
        assert!(payload["context"]["session"]["id"].is_string());

        client
            .post(format!("{next_url}/2018-06-01/runtime/invocation/{request_id}/response"))
            .json(&json!({"y": 2}))
            .send()
            .await
            .unwrap()
    });

    // Give the long poll a moment to register before triggering it.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let invoke_response = client
        .post(format!("{base_url}/v1/functions/echo/invoke"))
        .json(&json!({"params": {"x": 1}}))
        .send()
        .await
        .unwrap();

    assert_eq!(invoke_response.status(), 200);
    let body: serde_json::Value = invoke_response.json().await.unwrap();
    assert_eq!(body, json!({"y": 2}));

    let response_post = next_handle.await.unwrap();
    assert_eq!(response_post.status(), 202);
}

#[tokio::test]
async fn unknown_function_returns_404_without_creating_a_session() {
    let manifests = ManifestStore::new(camino::Utf8PathBuf::from("/does/not/exist"));
    manifests.load().await.unwrap();
    let base_url = spawn_bridge(manifests).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/v1/functions/ghost/invoke"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("Function not found in registry"));
}

#[tokio::test]
async fn no_runtime_connected_rejects_the_external_caller_with_503() {
    let manifests = manifests_with("echo", FunctionConfig::default()).await;
    let base_url = spawn_bridge(manifests).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/v1/functions/echo/invoke"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("No runtime connected"));
}

#[tokio::test]
async fn a_second_runtime_connection_preempts_the_first() {
    let manifests = manifests_with("echo", FunctionConfig::default()).await;
    let base_url = spawn_bridge(manifests).await;

    let first_url = base_url.clone();
    let first = tokio::spawn(async move {
        reqwest::Client::new()
            .get(format!("{first_url}/2018-06-01/runtime/invocation/next"))
            .send()
            .await
            .unwrap()
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let second_url = base_url.clone();
    let _second = tokio::spawn(async move {
        reqwest::Client::new()
            .get(format!("{second_url}/2018-06-01/runtime/invocation/next"))
            .send()
            .await
            .unwrap()
    });

    let first_response = first.await.unwrap();
    assert_eq!(first_response.status(), 503);
    let body: serde_json::Value = first_response.json().await.unwrap();
    assert_eq!(body["error"], json!("Another runtime connected"));
}

#[tokio::test]
async fn mismatched_request_id_is_rejected_and_the_caller_keeps_waiting() {
    let manifests = manifests_with("echo", FunctionConfig::default()).await;
    let base_url = spawn_bridge(manifests).await;

    let next_url = base_url.clone();
    let next_handle = tokio::spawn(async move {
        reqwest::Client::new()
            .get(format!("{next_url}/2018-06-01/runtime/invocation/next"))
            .send()
            .await
            .unwrap()
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let invoke_url = base_url.clone();
    let invoke_handle = tokio::spawn(async move {
        reqwest::Client::new()
            .post(format!("{invoke_url}/v1/functions/echo/invoke"))
            .json(&json!({}))
            .send()
            .await
            .unwrap()
    });

    let next_response = next_handle.await.unwrap();
    let request_id = next_response
        .headers()
        .get("Lambda-Runtime-Aws-Request-Id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();

    let client = reqwest::Client::new();
    let wrong_id = uuid::Uuid::new_v4();
    let mismatch = client
        .post(format!("{base_url}/2018-06-01/runtime/invocation/{wrong_id}/response"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(mismatch.status(), 400);

    let correct = client
        .post(format!("{base_url}/2018-06-01/runtime/invocation/{request_id}/response"))
        .json(&json!(null))
        .send()
        .await
        .unwrap();
    assert_eq!(correct.status(), 202);

    let invoke_response = invoke_handle.await.unwrap();
    assert_eq!(invoke_response.status(), 200);
}

#[tokio::test]
async fn liveness_probe_is_always_ok() {
    let manifests = ManifestStore::new(camino::Utf8PathBuf::from("/does/not/exist"));
    manifests.load().await.unwrap();
    let base_url = spawn_bridge(manifests).await;

    let response = reqwest::get(format!("{base_url}/")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"ok": true}));
}
