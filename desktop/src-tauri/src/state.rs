//! Shared Tauri application state.
use parking_lot::RwLock;
use std::sync::Arc;
use tauri::{AppHandle, Emitter};
use tracing::{info, warn};

use launcher_core::storage::{self, KvStore};
use launcher_core::system::detector::LocalDetector;
use launcher_core::system::firewall::NetshFirewall;
use launcher_core::system::process::ShellLauncher;
use launcher_core::system::runner::SystemRunner;
use launcher_core::system::steam::SteamClient;
use launcher_core::{
    paths, AccessControlPanel, LauncherRegistry, OnboardingStateMachine, OrchestratorSettings,
    SteamGames,
};

use crate::chooser::DialogChooser;

pub const PHASE_EVENT: &str = "onboarding://phase";

pub struct AppState {
    pub store: Arc<KvStore>,
    pub registry: Arc<LauncherRegistry>,
    pub panel: Arc<AccessControlPanel>,
    pub games: SteamGames,
    settings: OrchestratorSettings,
    detector: Arc<LocalDetector>,
    chooser: Arc<DialogChooser>,
    app: AppHandle,
    /// Replaced when onboarding is reset.
    onboarding: RwLock<OnboardingStateMachine>,
}

impl AppState {
    pub fn new(app: AppHandle) -> anyhow::Result<Self> {
        let path = paths::settings_path()?;
        let store = Arc::new(KvStore::open(&path)?);
        info!(path = %path.display(), "settings store opened");

        let settings = match storage::load_settings(&store).and_then(|s| {
            s.validate()?;
            Ok(s)
        }) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "invalid orchestrator settings, using defaults");
                OrchestratorSettings::default()
            }
        };

        let registry = Arc::new(LauncherRegistry::new());
        let detector = Arc::new(LocalDetector::new(store.clone()));
        let chooser = Arc::new(DialogChooser::new(app.clone()));
        let runner = Arc::new(SystemRunner);
        let firewall = Arc::new(NetshFirewall::new(store.clone(), runner.clone()));
        let panel = Arc::new(AccessControlPanel::new(
            firewall,
            Arc::new(ShellLauncher::new(store.clone())),
            registry.clone(),
            &settings,
        ));
        let games = SteamGames::new(panel.clone(), Arc::new(SteamClient::new(runner)));

        let onboarding = build_onboarding(&app, &detector, &chooser, &store, &registry, &settings);
        Ok(Self {
            store,
            registry,
            panel,
            games,
            settings,
            detector,
            chooser,
            app,
            onboarding: RwLock::new(onboarding),
        })
    }

    pub fn onboarding(&self) -> OnboardingStateMachine {
        self.onboarding.read().clone()
    }

    /// Starts a fresh onboarding session, cancelling the old one's timer.
    pub fn restart_onboarding(&self) -> OnboardingStateMachine {
        let fresh = build_onboarding(
            &self.app,
            &self.detector,
            &self.chooser,
            &self.store,
            &self.registry,
            &self.settings,
        );
        let old = std::mem::replace(&mut *self.onboarding.write(), fresh.clone());
        old.teardown();
        fresh
    }
}

fn build_onboarding(
    app: &AppHandle,
    detector: &Arc<LocalDetector>,
    chooser: &Arc<DialogChooser>,
    store: &Arc<KvStore>,
    registry: &Arc<LauncherRegistry>,
    settings: &OrchestratorSettings,
) -> OnboardingStateMachine {
    let machine = OnboardingStateMachine::new(
        detector.clone(),
        chooser.clone(),
        store.clone(),
        registry.clone(),
        settings,
    );
    forward_phases(app.clone(), &machine);
    machine
}

/// Pushes every phase change to the web view. Ends with the session.
fn forward_phases(app: AppHandle, machine: &OnboardingStateMachine) {
    let mut phases = machine.subscribe();
    tauri::async_runtime::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            if let Err(err) = app.emit(PHASE_EVENT, phase) {
                warn!(error = %err, "failed to emit onboarding phase");
            }
        }
    });
}
