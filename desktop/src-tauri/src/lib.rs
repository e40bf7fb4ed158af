//! Tauri application entry for Launcher Guard.

mod chooser;
mod commands;
mod state;

use tauri::{Manager, RunEvent};
use tracing::{error, info, warn};

pub use state::AppState;

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "launcher_core=info,launcher_guard_ui_lib=info".into()),
        )
        .init();

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let state = AppState::new(app.handle().clone())?;
            let panel = state.panel.clone();
            app.manage(state);
            info!("launcher guard started");

            // The panel shows cached state until the firewall has answered.
            tauri::async_runtime::spawn(async move {
                let report = panel.refresh_all().await;
                if !report.failed.is_empty() {
                    warn!(failed = report.failed.len(), "startup status refresh incomplete");
                }
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Onboarding
            commands::onboarding::onboarding_required,
            commands::onboarding::onboarding_start,
            commands::onboarding::onboarding_snapshot,
            commands::onboarding::onboarding_resolve_path,
            commands::onboarding::onboarding_skip,
            commands::onboarding::onboarding_request_skip_all,
            commands::onboarding::onboarding_confirm_skip,
            commands::onboarding::onboarding_cancel_skip,
            commands::onboarding::onboarding_finish,
            commands::onboarding::onboarding_reset,
            // Access panel
            commands::launchers::launchers_refresh,
            commands::launchers::launchers_view,
            commands::launchers::launcher_toggle,
            commands::launchers::launcher_expand,
            commands::launchers::launcher_collapse,
            commands::launchers::launcher_toggle_file,
            commands::launchers::launcher_open,
            // Steam games
            commands::games::steam_games,
            commands::games::steam_launch_game,
        ])
        .build(tauri::generate_context!());

    let app = match app {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "failed to build the application");
            std::process::exit(1);
        }
    };

    app.run(|handle, event| {
        if let RunEvent::Exit = event {
            if let Some(state) = handle.try_state::<AppState>() {
                state.onboarding().teardown();
            }
        }
    });
}
