use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::backend::ProcessLauncher;
use crate::error::{LauncherError, Result};
use crate::launcher::LauncherId;
use crate::storage::KvStore;
use crate::system::resolve_primary;
use crate::system::runner::spawn_detached;

/// Starts the launcher's main executable, detached, from its install
/// directory.
pub struct ShellLauncher {
    store: Arc<KvStore>,
}

impl ShellLauncher {
    pub fn new(store: Arc<KvStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProcessLauncher for ShellLauncher {
    async fn launch(&self, id: LauncherId) -> Result<()> {
        let failed = |message: String| LauncherError::Launch {
            launcher: id,
            message,
        };
        let spawned = self
            .store
            .blocking(move |store| {
                let Some(exe) = resolve_primary(store, id)? else {
                    return Ok(Err("executable not found".to_string()));
                };
                Ok(spawn_detached(&exe, &[], exe.parent())
                    .map_err(|e| format!("{}: {e}", exe.display())))
            })
            .await
            .map_err(|e| failed(e.to_string()))?;
        let pid = spawned.map_err(failed)?;
        info!(launcher = %id, pid, "launcher started");
        Ok(())
    }
}
