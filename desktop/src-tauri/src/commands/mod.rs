//! Tauri command handlers. Every command returns its error as a string.

pub mod launchers;
pub mod games;
pub mod onboarding;
