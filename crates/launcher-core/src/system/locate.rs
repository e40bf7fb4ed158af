//! Install locations the system itself records: Steam's install and
//! library folders via `steamlocate`, and the Epic launcher's registry
//! entry on Windows.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::launcher::LauncherId;
use crate::system::join_relative;

#[cfg(windows)]
const EPIC_REGISTRY_KEY: &str = r"SOFTWARE\WOW6432Node\Epic Games\EpicGamesLauncher";
const EPIC_LAUNCHER_RELATIVE: &str = r"Launcher\Portal\Binaries\Win64\EpicGamesLauncher.exe";

/// Main executable of `id` as reported by the system, if it exists.
pub fn installed_location(id: LauncherId) -> Option<PathBuf> {
    let exe = match id {
        LauncherId::Steam => steam_dir()?.join("steam.exe"),
        LauncherId::Epic => epic_launcher_exe(&epic_app_data()?),
        _ => return None,
    };
    if exe.is_file() {
        debug!(launcher = %id, path = %exe.display(), "install location reported by the system");
        Some(exe)
    } else {
        None
    }
}

/// Steam's install directory.
pub fn steam_dir() -> Option<PathBuf> {
    match steamlocate::SteamDir::locate() {
        Ok(steam) => Some(steam.path().to_path_buf()),
        Err(err) => {
            debug!(error = %err, "steam installation not located");
            None
        }
    }
}

/// Install directory of a Steam app, searching every library folder.
pub fn steam_app_dir(app_id: u32) -> Option<PathBuf> {
    let steam = steamlocate::SteamDir::locate().ok()?;
    match steam.find_app(app_id) {
        Ok(Some((app, library))) => Some(library.resolve_app_dir(&app)),
        Ok(None) => None,
        Err(err) => {
            debug!(app_id, error = %err, "steam app lookup failed");
            None
        }
    }
}

fn epic_launcher_exe(app_data: &Path) -> PathBuf {
    join_relative(app_data, EPIC_LAUNCHER_RELATIVE)
}

#[cfg(windows)]
fn epic_app_data() -> Option<PathBuf> {
    use winreg::enums::HKEY_LOCAL_MACHINE;
    use winreg::RegKey;

    let key = match RegKey::predef(HKEY_LOCAL_MACHINE).open_subkey(EPIC_REGISTRY_KEY) {
        Ok(key) => key,
        Err(err) => {
            debug!(error = %err, "epic registry key not present");
            return None;
        }
    };
    let data: String = key.get_value("AppDataPath").ok()?;
    Some(PathBuf::from(data))
}

#[cfg(not(windows))]
fn epic_app_data() -> Option<PathBuf> {
    None
}
