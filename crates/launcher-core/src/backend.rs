//! Contracts the orchestrator needs from the outside world.
//!
//! Locating executables, changing firewall rules and starting processes
//! are all done by collaborators behind these traits. The concrete local
//! implementations live in [`crate::system`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::launcher::LauncherId;
use crate::registry::DetectionRecord;

/// One firewall rule covering a single executable of a launcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRuleEntry {
    pub path: String,
    pub rule_name: String,
    pub blocked: bool,
}

/// A game installed in one of Steam's library folders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SteamGame {
    pub app_id: u32,
    pub name: String,
    pub install_dir: PathBuf,
    /// SteamID64 of the account that last played it.
    pub last_user: Option<u64>,
}

#[async_trait]
pub trait DetectionBackend: Send + Sync {
    /// Returns one record per known launcher, in identity order.
    async fn detect_all(&self) -> Result<Vec<DetectionRecord>>;

    async fn save_manual_path(&self, id: LauncherId, path: &Path) -> Result<()>;

    /// Marks a launcher as "not installed".
    async fn skip(&self, id: LauncherId) -> Result<()>;
}

#[async_trait]
pub trait EnforcementBackend: Send + Sync {
    /// `true` when the launcher's network access is blocked.
    async fn get_status(&self, id: LauncherId) -> Result<bool>;

    async fn set_blocked(&self, id: LauncherId, blocked: bool) -> Result<()>;

    async fn list_file_rules(&self, id: LauncherId) -> Result<Vec<FileRuleEntry>>;

    async fn set_file_rule(&self, rule_name: &str, path: &str, blocked: bool) -> Result<()>;
}

#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(&self, id: LauncherId) -> Result<()>;
}

/// The local Steam client: its game libraries and launch entry point.
#[async_trait]
pub trait GameLibrary: Send + Sync {
    async fn installed_games(&self) -> Result<Vec<SteamGame>>;

    /// Flips Steam's remembered offline-mode flag. Going offline also
    /// closes a running client so it restarts with the new setting.
    async fn set_offline_mode(&self, offline: bool) -> Result<()>;

    async fn launch_app(&self, app_id: u32) -> Result<()>;
}

/// Native executable chooser. `None` means the operator cancelled.
#[async_trait]
pub trait PathChooser: Send + Sync {
    async fn choose_executable(&self, id: LauncherId) -> Option<PathBuf>;
}

/// Durable "onboarding complete" flag.
#[async_trait]
pub trait CompletionStore: Send + Sync {
    async fn is_complete(&self) -> Result<bool>;

    /// Must be idempotent.
    async fn mark_complete(&self) -> Result<()>;

    async fn reset(&self) -> Result<()>;
}
