//! Launcher access panel Tauri commands.
use tauri::State;

use launcher_core::{FileRule, LauncherId, PanelView, RefreshReport};

use crate::state::AppState;

#[tauri::command]
pub async fn launchers_refresh(state: State<'_, AppState>) -> Result<RefreshReport, String> {
    Ok(state.panel.refresh_all().await)
}

#[tauri::command]
pub fn launchers_view(state: State<'_, AppState>) -> PanelView {
    state.panel.panel_view()
}

/// Returns the confirmed block state.
#[tauri::command]
pub async fn launcher_toggle(
    launcher: LauncherId,
    state: State<'_, AppState>,
) -> Result<bool, String> {
    Ok(state.panel.toggle(launcher).await?)
}

#[tauri::command]
pub async fn launcher_expand(
    launcher: LauncherId,
    state: State<'_, AppState>,
) -> Result<Vec<FileRule>, String> {
    Ok(state.panel.expand(launcher).await?)
}

#[tauri::command]
pub fn launcher_collapse(state: State<'_, AppState>) {
    state.panel.collapse();
}

#[tauri::command]
pub async fn launcher_toggle_file(
    rule: FileRule,
    state: State<'_, AppState>,
) -> Result<Vec<FileRule>, String> {
    Ok(state.panel.toggle_file(&rule).await?)
}

#[tauri::command]
pub async fn launcher_open(launcher: LauncherId, state: State<'_, AppState>) -> Result<(), String> {
    Ok(state.panel.launch(launcher).await?)
}
