//! Manifest emitter (introspect phase) and manifest store (runtime phase).
//!
//! Filesystem-touching code in the style of `registry/mod.rs` in the
//! gateway: plain `std::fs`, `anyhow::Context` on every fallible operation,
//! and `rstest`/`tempfile`-backed tests that exercise a real temp directory
//! rather than mocking the filesystem.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::{FunctionConfig, Registry};

pub fn default_manifests_dir() -> anyhow::Result<Utf8PathBuf> {
    if let Ok(override_dir) = std::env::var("FN_BRIDGE_MANIFESTS_DIR") {
        return Utf8PathBuf::from_path_buf(override_dir.into())
            .map_err(|p| anyhow::anyhow!("manifests dir is not valid UTF-8: {}", p.display()));
    }

    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|p| anyhow::anyhow!("cwd is not valid UTF-8: {}", p.display()))?;
    Ok(cwd.join(".browserbase").join("functions").join("manifests"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedManifestConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_config: Option<serde_json::Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters_schema: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedManifest {
    pub name: String,
    pub config: PersistedManifestConfig,
}

impl From<&FunctionConfig> for PersistedManifestConfig {
    fn from(config: &FunctionConfig) -> Self {
        let session_config = if config.session_config.is_empty() {
            None
        } else {
            Some(config.session_config.clone())
        };

        PersistedManifestConfig {
            session_config,
            parameters_schema: config.parameters_schema.clone(),
        }
    }
}

/// Writes one JSON manifest per registration during the introspect phase.
///
/// The first write observed in a process run (registry size transitioning to
/// 0 -> 1, per §4.3) clears `manifestsDir` recursively before writing, so
/// manifests from a previous run never linger next to the current ones.
pub struct ManifestEmitter {
    dir: Utf8PathBuf,
}

impl ManifestEmitter {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Registers `name` against `registry` and persists its manifest.
    pub fn register<F, Fut>(&self, registry: &Registry, name: impl Into<String>, config: FunctionConfig, handler: F) -> anyhow::Result<()>
    where
        F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = crate::registry::HandlerResult> + Send + 'static,
    {
        let name = name.into();
        registry.register(name.clone(), config.clone(), handler);

        if registry.len() == 1 {
            self.clear_dir()?;
        }

        self.write_manifest(&name, &config)
    }

    fn clear_dir(&self) -> anyhow::Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)
                .with_context(|| format!("failed to clear manifests dir {}", self.dir))?;
        }
        std::fs::create_dir_all(&self.dir).with_context(|| format!("failed to create manifests dir {}", self.dir))
    }

    fn write_manifest(&self, name: &str, config: &FunctionConfig) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| format!("failed to create manifests dir {}", self.dir))?;

        let manifest = PersistedManifest {
            name: name.to_owned(),
            config: config.into(),
        };

        let path = self.dir.join(format!("{name}.json"));
        let json = serde_json::to_string_pretty(&manifest).context("failed to render manifest as JSON")?;
        std::fs::write(&path, json).with_context(|| format!("failed to write manifest {path}"))
    }
}

/// In-memory name -> [`PersistedManifest`] map, populated by scanning
/// `manifestsDir` for `*.json` files.
#[derive(Clone)]
pub struct ManifestStore {
    dir: Utf8PathBuf,
    manifests: Arc<RwLock<HashMap<String, PersistedManifest>>>,
}

impl ManifestStore {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            manifests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Scans `manifestsDir` and replaces the in-memory map. A missing
    /// directory is logged, not an error — the store simply starts empty.
    pub async fn load(&self) -> anyhow::Result<()> {
        let dir = self.dir.clone();
        let manifests = tokio::task::spawn_blocking(move || read_manifests(&dir))
            .await
            .context("manifest scan task panicked")??;

        *self.manifests.write() = manifests;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<PersistedManifest> {
        self.manifests.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.manifests.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_manifests(dir: &Utf8Path) -> anyhow::Result<HashMap<String, PersistedManifest>> {
    let mut manifests = HashMap::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(%dir, "manifests directory does not exist; starting with an empty manifest store");
            return Ok(manifests);
        }
        Err(err) => return Err(err).with_context(|| format!("failed to read manifests dir {dir}")),
    };

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry under {dir}"))?;
        let path = entry.path();

        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }

        let content = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let manifest: PersistedManifest =
            serde_json::from_str(&content).with_context(|| format!("failed to parse manifest {}", path.display()))?;
        manifests.insert(manifest.name.clone(), manifest);
    }

    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use serde_json::json;

    fn noop_handler(_context: Value, params: Value) -> impl std::future::Future<Output = crate::registry::HandlerResult> {
        async move { Ok(params) }
    }

    #[fixture]
    fn tempdir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    fn first_registration_of_a_run_clears_stale_manifests(tempdir: tempfile::TempDir) {
        let dir = Utf8PathBuf::from_path_buf(tempdir.path().to_owned()).unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("stale.json"), "{}").unwrap();

        let registry = Registry::new();
        let emitter = ManifestEmitter::new(dir.clone());
        emitter
            .register(&registry, "fresh", FunctionConfig::default(), noop_handler)
            .unwrap();

        assert!(!dir.join("stale.json").exists());
        assert!(dir.join("fresh.json").exists());
    }

    #[rstest]
    fn subsequent_registrations_in_the_same_run_only_add(tempdir: tempfile::TempDir) {
        let dir = Utf8PathBuf::from_path_buf(tempdir.path().to_owned()).unwrap();
        let registry = Registry::new();
        let emitter = ManifestEmitter::new(dir.clone());

        emitter
            .register(&registry, "one", FunctionConfig::default(), noop_handler)
            .unwrap();
        emitter
            .register(&registry, "two", FunctionConfig::default(), noop_handler)
            .unwrap();

        assert!(dir.join("one.json").exists());
        assert!(dir.join("two.json").exists());
    }

    #[rstest]
    fn parameters_schema_is_persisted_verbatim(tempdir: tempfile::TempDir) {
        let dir = Utf8PathBuf::from_path_buf(tempdir.path().to_owned()).unwrap();
        let registry = Registry::new();
        let emitter = ManifestEmitter::new(dir.clone());

        let schema = json!({
            "type": "object",
            "properties": {"data": {"type": "number"}},
            "required": ["data"],
        });
        let config = FunctionConfig {
            session_config: Default::default(),
            parameters_schema: Some(schema.clone()),
        };
        emitter.register(&registry, "double", config, noop_handler).unwrap();

        let content = std::fs::read_to_string(dir.join("double.json")).unwrap();
        let manifest: PersistedManifest = serde_json::from_str(&content).unwrap();
        assert_eq!(manifest.config.parameters_schema, Some(schema));
    }

    #[rstest]
    #[tokio::test]
    async fn store_starts_empty_when_directory_is_missing(tempdir: tempfile::TempDir) {
        let missing = Utf8PathBuf::from_path_buf(tempdir.path().join("does-not-exist")).unwrap();
        let store = ManifestStore::new(missing);
        store.load().await.unwrap();
        assert!(store.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn store_loads_every_manifest_written_by_the_emitter(tempdir: tempfile::TempDir) {
        let dir = Utf8PathBuf::from_path_buf(tempdir.path().to_owned()).unwrap();
        let registry = Registry::new();
        let emitter = ManifestEmitter::new(dir.clone());
        emitter
            .register(&registry, "echo", FunctionConfig::default(), noop_handler)
            .unwrap();

        let store = ManifestStore::new(dir);
        store.load().await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("echo").unwrap().name, "echo");
        assert!(store.get("ghost").is_none());
    }
}
