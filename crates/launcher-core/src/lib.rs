//! Core of the launcher guard: first-run launcher discovery and the
//! per-launcher network access panel, plus Steam game launches that
//! follow the panel's Steam rules.

pub mod access;
pub mod backend;
pub mod error;
pub mod games;
pub mod launcher;
pub mod onboarding;
pub mod paths;
pub mod registry;
pub mod settings;
pub mod storage;
pub mod system;

pub use access::{AccessControlPanel, FileRule, PanelView, RefreshReport};
pub use backend::SteamGame;
pub use error::{LauncherError, Result};
pub use games::SteamGames;
pub use launcher::LauncherId;
pub use onboarding::{OnboardingPhase, OnboardingStateMachine, OnboardingView};
pub use registry::{DetectionRecord, DetectionStatus, LauncherRegistry};
pub use settings::OrchestratorSettings;
pub use storage::KvStore;
