use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::DetectionBackend;
use crate::error::{LauncherError, Result};
use crate::launcher::LauncherId;
use crate::registry::DetectionRecord;
use crate::storage::KvStore;
use crate::system::resolve_primary;

/// Finds launchers on the local disk.
///
/// Per launcher: a "not installed" mark wins, then a saved manual path,
/// then the first well-known install location that exists.
pub struct LocalDetector {
    store: Arc<KvStore>,
}

impl LocalDetector {
    pub fn new(store: Arc<KvStore>) -> Self {
        Self { store }
    }

    fn detect(&self, id: LauncherId) -> Result<DetectionRecord> {
        if self.store.is_skipped(id)? {
            return Ok(DetectionRecord::skipped(id));
        }
        match resolve_primary(&self.store, id)? {
            Some(path) => {
                debug!(launcher = %id, path = %path.display(), "launcher found");
                Ok(DetectionRecord::found(id, path))
            }
            None => Ok(DetectionRecord::not_found(id)),
        }
    }
}

#[async_trait]
impl DetectionBackend for LocalDetector {
    async fn detect_all(&self) -> Result<Vec<DetectionRecord>> {
        let detector = LocalDetector::new(self.store.clone());
        self.store
            .blocking(move |_| {
                LauncherId::ALL
                    .into_iter()
                    .map(|id| detector.detect(id))
                    .collect::<Result<Vec<_>>>()
            })
            .await
            .map_err(|e| LauncherError::Detection(e.to_string()))
    }

    async fn save_manual_path(&self, id: LauncherId, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        self.store
            .blocking(move |store| {
                if !path.is_file() {
                    return Err(LauncherError::Detection(format!(
                        "{} is not an executable file",
                        path.display()
                    )));
                }
                store.set_manual_path(id, &path)?;
                store.set_skipped(id, false)?;
                info!(launcher = %id, path = %path.display(), "manual launcher path stored");
                Ok(())
            })
            .await
    }

    async fn skip(&self, id: LauncherId) -> Result<()> {
        self.store
            .blocking(move |store| store.set_skipped(id, true))
            .await
    }
}
