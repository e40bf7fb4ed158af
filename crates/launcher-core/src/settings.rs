use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LauncherError, Result};

const MAX_AUTO_COMPLETE_DELAY_MS: u64 = 60_000;
const MAX_STATUS_RETRIES: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// How long the "all launchers found" screen stays up before onboarding
    /// completes on its own.
    #[serde(default = "default_delay")]
    pub auto_complete_delay_ms: u64,
    /// Extra attempts for a failed status query during a full refresh.
    #[serde(default = "default_retries")]
    pub status_retries: u8,
}

fn default_delay() -> u64 {
    3_000
}

fn default_retries() -> u8 {
    1
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            auto_complete_delay_ms: default_delay(),
            status_retries: default_retries(),
        }
    }
}

impl OrchestratorSettings {
    pub fn auto_complete_delay(&self) -> Duration {
        Duration::from_millis(self.auto_complete_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auto_complete_delay_ms > MAX_AUTO_COMPLETE_DELAY_MS {
            return Err(LauncherError::InvalidState(format!(
                "auto-complete delay must be at most {MAX_AUTO_COMPLETE_DELAY_MS} ms"
            )));
        }
        if self.status_retries > MAX_STATUS_RETRIES {
            return Err(LauncherError::InvalidState(format!(
                "status retries must be at most {MAX_STATUS_RETRIES}"
            )));
        }
        Ok(())
    }
}
