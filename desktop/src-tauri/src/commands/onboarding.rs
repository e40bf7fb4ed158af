//! Onboarding Tauri commands.
use tauri::State;
use tracing::info;

use launcher_core::{LauncherId, OnboardingStateMachine, OnboardingView};

use crate::state::AppState;

#[tauri::command]
pub async fn onboarding_required(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(OnboardingStateMachine::is_required(state.store.as_ref()).await?)
}

#[tauri::command]
pub async fn onboarding_start(state: State<'_, AppState>) -> Result<OnboardingView, String> {
    let machine = state.onboarding();
    machine.start().await?;
    Ok(machine.snapshot())
}

#[tauri::command]
pub fn onboarding_snapshot(state: State<'_, AppState>) -> OnboardingView {
    state.onboarding().snapshot()
}

#[tauri::command]
pub async fn onboarding_resolve_path(
    launcher: LauncherId,
    state: State<'_, AppState>,
) -> Result<OnboardingView, String> {
    let machine = state.onboarding();
    machine.resolve_path(launcher).await?;
    Ok(machine.snapshot())
}

#[tauri::command]
pub async fn onboarding_skip(
    launcher: LauncherId,
    state: State<'_, AppState>,
) -> Result<OnboardingView, String> {
    let machine = state.onboarding();
    machine.skip(launcher).await?;
    Ok(machine.snapshot())
}

#[tauri::command]
pub fn onboarding_request_skip_all(state: State<'_, AppState>) -> Result<OnboardingView, String> {
    let machine = state.onboarding();
    machine.request_skip_all()?;
    Ok(machine.snapshot())
}

#[tauri::command]
pub async fn onboarding_confirm_skip(state: State<'_, AppState>) -> Result<OnboardingView, String> {
    let machine = state.onboarding();
    machine.confirm_skip().await?;
    Ok(machine.snapshot())
}

#[tauri::command]
pub fn onboarding_cancel_skip(state: State<'_, AppState>) -> Result<OnboardingView, String> {
    let machine = state.onboarding();
    machine.cancel_skip()?;
    Ok(machine.snapshot())
}

#[tauri::command]
pub async fn onboarding_finish(state: State<'_, AppState>) -> Result<OnboardingView, String> {
    let machine = state.onboarding();
    machine.finish().await?;
    Ok(machine.snapshot())
}

/// Clears the completion flag and starts a new session.
#[tauri::command]
pub async fn onboarding_reset(state: State<'_, AppState>) -> Result<OnboardingView, String> {
    OnboardingStateMachine::reset(state.store.as_ref()).await?;
    let machine = state.restart_onboarding();
    info!("onboarding session restarted");
    Ok(machine.snapshot())
}
