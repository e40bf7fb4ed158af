//! Error types for the launcher orchestrator

use serde::Serialize;
use thiserror::Error;

use crate::launcher::LauncherId;

#[derive(Error, Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail")]
pub enum LauncherError {
    /// The scan could not enumerate launchers. Retry with another scan.
    #[error("Launcher detection failed: {0}")]
    Detection(String),

    /// The backend rejected a block/unblock or file-rule request.
    #[error("Firewall request failed: {0}")]
    Enforcement(String),

    /// A status or file-list query failed.
    #[error("Status query failed for {launcher}: {message}")]
    Fetch { launcher: LauncherId, message: String },

    /// The onboarding completion flag could not be written.
    #[error("Could not save onboarding state: {0}")]
    Persistence(String),

    #[error("Could not start {launcher}: {message}")]
    Launch { launcher: LauncherId, message: String },

    /// Steam or its library folders could not be read.
    #[error("Steam library unavailable: {0}")]
    Library(String),

    #[error("A request for {0} is already in progress")]
    Busy(LauncherId),

    #[error("Unresolved launchers: {}", format_ids(.0))]
    Unresolved(Vec<LauncherId>),

    #[error("Invalid operation: {0}")]
    InvalidState(String),

    #[error("Unknown launcher: {0}")]
    UnknownLauncher(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn format_ids(ids: &[LauncherId]) -> String {
    ids.iter()
        .map(|id| id.key())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<std::io::Error> for LauncherError {
    fn from(e: std::io::Error) -> Self {
        LauncherError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for LauncherError {
    fn from(e: serde_json::Error) -> Self {
        LauncherError::Serialization(e.to_string())
    }
}

// Tauri commands report errors as plain strings
impl From<LauncherError> for String {
    fn from(e: LauncherError) -> String {
        e.to_string()
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
