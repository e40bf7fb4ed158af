use async_trait::async_trait;
use std::path::PathBuf;
use tauri::AppHandle;
use tauri_plugin_dialog::DialogExt;
use tracing::warn;

use launcher_core::backend::PathChooser;
use launcher_core::LauncherId;

/// Native "open file" dialog restricted to executables.
pub struct DialogChooser {
    app: AppHandle,
}

impl DialogChooser {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

#[async_trait]
impl PathChooser for DialogChooser {
    async fn choose_executable(&self, id: LauncherId) -> Option<PathBuf> {
        let app = self.app.clone();
        let title = format!("Select the {} executable", id.name());
        let picked = tokio::task::spawn_blocking(move || {
            app.dialog()
                .file()
                .add_filter("Executables", &["exe"])
                .set_title(title)
                .blocking_pick_file()
        })
        .await;

        match picked {
            Ok(file) => file.and_then(|f| f.into_path().ok()),
            Err(err) => {
                warn!(launcher = %id, error = %err, "file dialog task failed");
                None
            }
        }
    }
}
