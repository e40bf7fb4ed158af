//! Launching Steam games with Steam's network access set to match.
//!
//! An offline launch blocks Steam's firewall rules before the game
//! starts, an online launch lifts them. The block goes through the access
//! panel so the panel's cache and busy marks stay consistent.

use std::sync::Arc;
use tracing::{info, warn};

use crate::access::AccessControlPanel;
use crate::backend::{GameLibrary, SteamGame};
use crate::error::{LauncherError, Result};
use crate::launcher::LauncherId;

pub struct SteamGames {
    panel: Arc<AccessControlPanel>,
    library: Arc<dyn GameLibrary>,
}

impl SteamGames {
    pub fn new(panel: Arc<AccessControlPanel>, library: Arc<dyn GameLibrary>) -> Self {
        Self { panel, library }
    }

    pub async fn installed(&self) -> Result<Vec<SteamGame>> {
        self.library.installed_games().await.map_err(|err| {
            warn!(error = %err, "could not list steam games");
            match err {
                LauncherError::Library(_) => err,
                other => LauncherError::Library(other.to_string()),
            }
        })
    }

    /// Sets Steam's block state to `offline`, then starts `app_id`. The
    /// game is not started when the firewall change is rejected.
    pub async fn launch(&self, app_id: u32, offline: bool) -> Result<()> {
        info!(app_id, offline, "launching steam game");
        self.panel.set_blocked(LauncherId::Steam, offline).await?;

        if let Err(err) = self.library.set_offline_mode(offline).await {
            warn!(offline, error = %err, "could not update steam offline flag");
        }

        self.library.launch_app(app_id).await.map_err(|err| {
            warn!(app_id, error = %err, "steam game start failed");
            LauncherError::Launch {
                launcher: LauncherId::Steam,
                message: err.to_string(),
            }
        })
    }
}
