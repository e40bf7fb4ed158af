//! Local key-value storage.
//!
//! Every key lives in one JSON document. Each `set` rewrites the whole file
//! through a temp file in the same directory and renames it into place, so
//! a single key write is atomic. Writes to different keys are not
//! transactional.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::backend::CompletionStore;
use crate::error::{LauncherError, Result};
use crate::launcher::LauncherId;
use crate::settings::OrchestratorSettings;

pub const ONBOARDING_COMPLETE_KEY: &str = "onboarding.complete";
pub const MANUAL_PATHS_KEY: &str = "launchers.manual_paths";
pub const SKIPPED_KEY: &str = "launchers.skipped";
pub const SETTINGS_KEY: &str = "orchestrator.settings";

type Entries = BTreeMap<String, serde_json::Value>;

#[derive(Debug)]
struct StoreFile {
    path: PathBuf,
    entries: Mutex<Entries>,
}

/// Clones share one file and one cache.
#[derive(Debug, Clone)]
pub struct KvStore {
    file: Arc<StoreFile>,
}

impl KvStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let entries = if path.exists() {
            let data = fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                Entries::new()
            } else {
                serde_json::from_str(&data)?
            }
        } else {
            Entries::new()
        };
        Ok(Self {
            file: Arc::new(StoreFile {
                path,
                entries: Mutex::new(entries),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Runs `f` on the blocking pool so file IO stays off runtime threads.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&KvStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| LauncherError::Io(format!("storage task failed: {e}")))?
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let entries = self.file.entries.lock();
        match entries.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut entries = self.file.entries.lock();
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.write_file(&next)?;
        *entries = next;
        debug!(key, "stored key");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.file.entries.lock();
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.write_file(&next)?;
        *entries = next;
        Ok(())
    }

    fn write_file(&self, entries: &Entries) -> Result<()> {
        let dir = self
            .file
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let data = serde_json::to_vec_pretty(entries)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.file.path)
            .map_err(|e| LauncherError::Io(e.error.to_string()))?;
        Ok(())
    }

    pub fn manual_path(&self, id: LauncherId) -> Result<Option<PathBuf>> {
        let paths: BTreeMap<String, PathBuf> = self.get(MANUAL_PATHS_KEY)?.unwrap_or_default();
        Ok(paths.get(id.key()).cloned())
    }

    pub fn set_manual_path(&self, id: LauncherId, path: &Path) -> Result<()> {
        let mut paths: BTreeMap<String, PathBuf> = self.get(MANUAL_PATHS_KEY)?.unwrap_or_default();
        paths.insert(id.key().to_string(), path.to_path_buf());
        self.set(MANUAL_PATHS_KEY, &paths)
    }

    pub fn is_skipped(&self, id: LauncherId) -> Result<bool> {
        let skipped: BTreeSet<String> = self.get(SKIPPED_KEY)?.unwrap_or_default();
        Ok(skipped.contains(id.key()))
    }

    pub fn set_skipped(&self, id: LauncherId, skipped: bool) -> Result<()> {
        let mut set: BTreeSet<String> = self.get(SKIPPED_KEY)?.unwrap_or_default();
        let changed = if skipped {
            set.insert(id.key().to_string())
        } else {
            set.remove(id.key())
        };
        if changed {
            self.set(SKIPPED_KEY, &set)?;
        }
        Ok(())
    }
}

pub fn load_settings(store: &KvStore) -> Result<OrchestratorSettings> {
    Ok(store.get(SETTINGS_KEY)?.unwrap_or_default())
}

pub fn save_settings(store: &KvStore, settings: &OrchestratorSettings) -> Result<()> {
    settings.validate()?;
    store.set(SETTINGS_KEY, settings)
}

#[async_trait]
impl CompletionStore for KvStore {
    async fn is_complete(&self) -> Result<bool> {
        self.blocking(|store| Ok(store.get::<bool>(ONBOARDING_COMPLETE_KEY)?.unwrap_or(false)))
            .await
    }

    async fn mark_complete(&self) -> Result<()> {
        self.blocking(|store| {
            if store.get::<bool>(ONBOARDING_COMPLETE_KEY)?.unwrap_or(false) {
                return Ok(());
            }
            store.set(ONBOARDING_COMPLETE_KEY, &true)
        })
        .await
        .map_err(|e| LauncherError::Persistence(e.to_string()))
    }

    async fn reset(&self) -> Result<()> {
        self.blocking(|store| store.remove(ONBOARDING_COMPLETE_KEY))
            .await
            .map_err(|e| LauncherError::Persistence(e.to_string()))
    }
}
