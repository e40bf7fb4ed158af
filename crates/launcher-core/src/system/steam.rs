//! The local Steam client, found through `steamlocate`.
//!
//! Offline launches rely on Steam's own "WantsOfflineMode" flag in
//! `config/loginusers.vdf`, which the client reads at startup.

use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::backend::{GameLibrary, SteamGame};
use crate::error::{LauncherError, Result};
use crate::system::runner::{spawn_detached, CommandRunner};

const EXIT_POLLS: u32 = 10;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct SteamClient {
    runner: Arc<dyn CommandRunner>,
}

impl SteamClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn locate() -> Result<steamlocate::SteamDir> {
        steamlocate::SteamDir::locate().map_err(|e| LauncherError::Library(e.to_string()))
    }

    fn installed_now(&self) -> Result<Vec<SteamGame>> {
        let steam = Self::locate()?;
        let libraries = steam
            .libraries()
            .map_err(|e| LauncherError::Library(e.to_string()))?;

        let mut games = Vec::new();
        for library in libraries {
            let library = match library {
                Ok(library) => library,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable steam library");
                    continue;
                }
            };
            for app in library.apps() {
                match app {
                    Ok(app) => games.push(SteamGame {
                        app_id: app.app_id,
                        name: app
                            .name
                            .clone()
                            .unwrap_or_else(|| format!("App {}", app.app_id)),
                        install_dir: library.resolve_app_dir(&app),
                        last_user: app.last_user,
                    }),
                    Err(err) => debug!(error = %err, "skipping unreadable app manifest"),
                }
            }
        }
        games.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        info!(count = games.len(), "steam libraries read");
        Ok(games)
    }

    fn set_offline_now(&self, offline: bool) -> Result<()> {
        let steam = Self::locate()?;
        if offline {
            self.close_client();
        }

        let vdf = steam.path().join("config").join("loginusers.vdf");
        if !vdf.is_file() {
            debug!(path = %vdf.display(), "no saved steam logins, offline flag left alone");
            return Ok(());
        }
        let content = fs::read_to_string(&vdf)?;
        match with_offline_flag(&content, offline) {
            Some(patched) => {
                replace_file(&vdf, patched.as_bytes())?;
                info!(offline, "steam offline flag updated");
            }
            None => debug!(offline, "steam offline flag already set"),
        }
        Ok(())
    }

    /// Kills steam.exe and waits briefly for it to go away.
    fn close_client(&self) {
        let args = ["/F", "/IM", "steam.exe"].map(String::from);
        match self.runner.run("taskkill", &args) {
            Ok(output) => debug!(closed = output.success, "taskkill steam.exe"),
            Err(err) => {
                warn!(error = %err, "could not run taskkill");
                return;
            }
        }

        let query = ["/FI", "IMAGENAME eq steam.exe"].map(String::from);
        for _ in 0..EXIT_POLLS {
            match self.runner.run("tasklist", &query) {
                Ok(output) if output.stdout.to_lowercase().contains("steam.exe") => {
                    std::thread::sleep(EXIT_POLL_INTERVAL);
                }
                _ => return,
            }
        }
        warn!("steam.exe still running after taskkill");
    }

    fn launch_now(&self, app_id: u32) -> Result<u32> {
        let steam = Self::locate()?;
        let exe = steam.path().join("steam.exe");
        let args = ["-applaunch".to_string(), app_id.to_string()];
        spawn_detached(&exe, &args, Some(steam.path())).map_err(|e| {
            LauncherError::Io(format!("{}: {e}", exe.display()))
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SteamClient) -> Result<T> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(this))
            .await
            .map_err(|e| LauncherError::Library(format!("steam task failed: {e}")))?
    }
}

#[async_trait]
impl GameLibrary for SteamClient {
    async fn installed_games(&self) -> Result<Vec<SteamGame>> {
        self.blocking(|client| client.installed_now()).await
    }

    async fn set_offline_mode(&self, offline: bool) -> Result<()> {
        self.blocking(move |client| client.set_offline_now(offline))
            .await
    }

    async fn launch_app(&self, app_id: u32) -> Result<()> {
        let pid = self.blocking(move |client| client.launch_now(app_id)).await?;
        info!(app_id, pid, "steam asked to launch app");
        Ok(())
    }
}

/// `content` with every "WantsOfflineMode" entry set to `offline`, or
/// `None` when nothing changes. Steam writes the pair tab-separated;
/// hand-edited files may use one space.
fn with_offline_flag(content: &str, offline: bool) -> Option<String> {
    let (from, to) = if offline { ("0", "1") } else { ("1", "0") };
    let mut patched = content.to_string();
    for sep in ["\t\t", " "] {
        patched = patched.replace(
            &format!("\"WantsOfflineMode\"{sep}\"{from}\""),
            &format!("\"WantsOfflineMode\"{sep}\"{to}\""),
        );
    }
    (patched != content).then_some(patched)
}

fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| LauncherError::Io(e.error.to_string()))?;
    Ok(())
}
