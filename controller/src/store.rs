use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use hvac_common::{PersistedState, RuntimeConfig};

/// JSON files under the data directory: `runtime.json` for configuration,
/// `persisted.json` for the counters that survive a restart.
#[derive(Clone)]
pub struct AppStore {
    runtime_path: Arc<PathBuf>,
    persisted_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl AppStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            persisted_path: Arc::new(data_dir.join("persisted.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_env() -> Self {
        let data_dir = std::env::var("HVAC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.hvac"));
        Self::new(data_dir)
    }

    pub async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        self.load(&self.runtime_path).await
    }

    pub async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        self.save(&self.runtime_path, runtime).await
    }

    /// Loads the runtime config, clamps it and writes it back, so a fresh
    /// data directory gets a complete file to edit. A malformed file is left
    /// untouched.
    pub async fn prepare_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let mut runtime = self.load_runtime_config().await?;
        runtime.hvac.sanitize();
        self.save_runtime_config(&runtime).await?;
        Ok(runtime)
    }

    pub async fn load_persisted(&self) -> anyhow::Result<PersistedState> {
        self.load(&self.persisted_path).await
    }

    pub async fn save_persisted(&self, state: &PersistedState) -> anyhow::Result<()> {
        self.save(&self.persisted_path, state).await
    }

    async fn load<T: DeserializeOwned + Default>(&self, path: &Path) -> anyhow::Result<T> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(path).await {
            Ok(raw) => serde_json::from_slice::<T>(&raw)
                .with_context(|| format!("malformed {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save<T: Serialize>(&self, path: &Path, value: &T) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(path, payload)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
