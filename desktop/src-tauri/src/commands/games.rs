//! Steam game library Tauri commands.
use tauri::State;

use launcher_core::SteamGame;

use crate::state::AppState;

#[tauri::command]
pub async fn steam_games(state: State<'_, AppState>) -> Result<Vec<SteamGame>, String> {
    Ok(state.games.installed().await?)
}

/// Blocks Steam's network access first when `offline` is set.
#[tauri::command]
pub async fn steam_launch_game(
    app_id: u32,
    offline: bool,
    state: State<'_, AppState>,
) -> Result<(), String> {
    Ok(state.games.launch(app_id, offline).await?)
}
