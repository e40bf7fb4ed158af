//! Steady-state control of launcher network access.
//!
//! The firewall is the source of truth. The registry's access state is a
//! cache refreshed on load and after every accepted mutation, and the file
//! rule list of the expanded launcher is always replaced wholesale from
//! the backend, never patched locally.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{EnforcementBackend, FileRuleEntry, ProcessLauncher};
use crate::error::{LauncherError, Result};
use crate::launcher::LauncherId;
use crate::registry::{AccessState, LauncherRegistry};
use crate::settings::OrchestratorSettings;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileRule {
    pub launcher: LauncherId,
    pub path: String,
    pub rule_name: String,
    pub blocked: bool,
}

impl FileRule {
    fn from_entry(launcher: LauncherId, entry: FileRuleEntry) -> Self {
        Self {
            launcher,
            path: entry.path,
            rule_name: entry.rule_name,
            blocked: entry.blocked,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailedQuery {
    pub id: LauncherId,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub updated: Vec<AccessState>,
    pub failed: Vec<FailedQuery>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherPanelRow {
    pub id: LauncherId,
    pub name_key: &'static str,
    pub desc_key: &'static str,
    pub blocked: bool,
    pub busy: bool,
    /// The last status query for this launcher failed.
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub launchers: Vec<LauncherPanelRow>,
    pub expanded: Option<LauncherId>,
    pub files: Vec<FileRule>,
}

#[derive(Debug, Default)]
struct PanelState {
    busy: HashSet<LauncherId>,
    expanded: Option<LauncherId>,
    files: Vec<FileRule>,
    files_seq: u64,
    /// Bumped on every committed toggle so slower status reads can't
    /// overwrite a newer value.
    epochs: HashMap<LauncherId, u64>,
    flagged: BTreeSet<LauncherId>,
}

/// Releases the per-launcher busy mark even if the toggle future is dropped.
struct BusyGuard<'a> {
    state: &'a Mutex<PanelState>,
    id: LauncherId,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().busy.remove(&self.id);
    }
}

pub struct AccessControlPanel {
    enforcement: Arc<dyn EnforcementBackend>,
    launcher: Arc<dyn ProcessLauncher>,
    registry: Arc<LauncherRegistry>,
    status_retries: u8,
    state: Mutex<PanelState>,
}

impl AccessControlPanel {
    pub fn new(
        enforcement: Arc<dyn EnforcementBackend>,
        launcher: Arc<dyn ProcessLauncher>,
        registry: Arc<LauncherRegistry>,
        settings: &OrchestratorSettings,
    ) -> Self {
        Self {
            enforcement,
            launcher,
            registry,
            status_retries: settings.status_retries,
            state: Mutex::new(PanelState::default()),
        }
    }

    pub fn registry(&self) -> &Arc<LauncherRegistry> {
        &self.registry
    }

    /// Queries every launcher's block status. One failing launcher never
    /// discards the others' results.
    pub async fn refresh_all(&self) -> RefreshReport {
        let mut report = RefreshReport::default();
        for id in LauncherId::ALL {
            match self.refresh_one(id).await {
                Ok(blocked) => report.updated.push(AccessState { id, blocked }),
                Err(err) => report.failed.push(FailedQuery {
                    id,
                    message: err.to_string(),
                }),
            }
        }
        info!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            "launcher status refresh finished"
        );
        report
    }

    async fn refresh_one(&self, id: LauncherId) -> Result<bool> {
        let epoch = self.epoch(id);
        let mut attempt = 0u8;
        let result = loop {
            match self.enforcement.get_status(id).await {
                Ok(blocked) => break Ok(blocked),
                Err(err) if attempt < self.status_retries => {
                    attempt += 1;
                    debug!(launcher = %id, attempt, error = %err, "retrying status query");
                }
                Err(err) => break Err(err),
            }
        };

        let mut state = self.state.lock();
        match result {
            Ok(blocked) => {
                state.flagged.remove(&id);
                let current = state.epochs.get(&id).copied().unwrap_or(0);
                if current == epoch && !state.busy.contains(&id) {
                    self.registry.set_blocked(id, blocked);
                    Ok(blocked)
                } else {
                    debug!(launcher = %id, "status superseded by a toggle");
                    Ok(self.registry.access(id).blocked)
                }
            }
            Err(err) => {
                warn!(launcher = %id, error = %err, "status query failed, keeping cached state");
                state.flagged.insert(id);
                Err(as_fetch(id, err))
            }
        }
    }

    /// Flips the launcher's block state. Returns the confirmed new value.
    pub async fn toggle(&self, id: LauncherId) -> Result<bool> {
        let _busy = self.acquire(id)?;
        let desired = !self.registry.access(id).blocked;
        self.apply_blocked(id, desired).await
    }

    /// Drives the launcher to a given block state, whatever the cache
    /// says. Returns the confirmed value.
    pub async fn set_blocked(&self, id: LauncherId, blocked: bool) -> Result<bool> {
        let _busy = self.acquire(id)?;
        self.apply_blocked(id, blocked).await
    }

    async fn apply_blocked(&self, id: LauncherId, desired: bool) -> Result<bool> {
        info!(launcher = %id, blocked = desired, "changing network access");

        if let Err(err) = self.enforcement.set_blocked(id, desired).await {
            warn!(launcher = %id, error = %err, "firewall rejected toggle");
            return Err(as_enforcement(err));
        }
        self.commit(id, desired);

        let confirmed = match self.enforcement.get_status(id).await {
            Ok(actual) => {
                if actual != desired {
                    warn!(launcher = %id, expected = desired, actual, "firewall reports a different state");
                    self.commit(id, actual);
                }
                self.state.lock().flagged.remove(&id);
                actual
            }
            Err(err) => {
                warn!(launcher = %id, error = %err, "could not confirm toggle");
                self.state.lock().flagged.insert(id);
                desired
            }
        };

        if self.expanded() == Some(id) {
            if let Err(err) = self.fetch_files(id).await {
                warn!(launcher = %id, error = %err, "file list refresh after toggle failed");
            }
        }
        Ok(confirmed)
    }

    /// Shows `id`'s file rules, collapsing and discarding any other list.
    pub async fn expand(&self, id: LauncherId) -> Result<Vec<FileRule>> {
        {
            let mut state = self.state.lock();
            if let Some(previous) = state.expanded.filter(|p| *p != id) {
                debug!(launcher = %previous, "collapsing file panel");
            }
            state.expanded = Some(id);
            state.files.clear();
        }
        self.fetch_files(id).await
    }

    pub fn collapse(&self) {
        let mut state = self.state.lock();
        state.expanded = None;
        state.files.clear();
        state.files_seq += 1;
    }

    /// Replaces the cached file list with the backend's full answer. A
    /// response for a launcher that is no longer expanded, or that a newer
    /// fetch has overtaken, is returned but not cached.
    pub async fn fetch_files(&self, id: LauncherId) -> Result<Vec<FileRule>> {
        let seq = {
            let mut state = self.state.lock();
            state.files_seq += 1;
            state.files_seq
        };

        let entries = match self.enforcement.list_file_rules(id).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(launcher = %id, error = %err, "file list query failed");
                return Err(as_fetch(id, err));
            }
        };
        let rules: Vec<FileRule> = entries
            .into_iter()
            .map(|entry| FileRule::from_entry(id, entry))
            .collect();

        let mut state = self.state.lock();
        if state.expanded == Some(id) && state.files_seq == seq {
            state.files = rules.clone();
        } else {
            debug!(launcher = %id, "discarding stale file list");
        }
        Ok(rules)
    }

    /// Flips one file rule, then re-reads the owner's file list whether or
    /// not the change was accepted. Only rules in the displayed list for
    /// that launcher are sent to the backend.
    pub async fn toggle_file(&self, rule: &FileRule) -> Result<Vec<FileRule>> {
        let desired = !rule.blocked;
        let result = if self.is_listed(rule) {
            info!(rule = %rule.rule_name, blocked = desired, "changing file rule");
            self.enforcement
                .set_file_rule(&rule.rule_name, &rule.path, desired)
                .await
        } else {
            Err(LauncherError::Enforcement(format!(
                "rule '{}' is not listed for {}",
                rule.rule_name, rule.launcher
            )))
        };

        let refreshed = self.fetch_files(rule.launcher).await;
        if !self.is_busy(rule.launcher) {
            // The launcher-level status is derived from its rules.
            let _ = self.refresh_one(rule.launcher).await;
        }

        if let Err(err) = result {
            warn!(rule = %rule.rule_name, error = %err, "firewall rejected file rule change");
            return Err(as_enforcement(err));
        }
        refreshed
    }

    /// Best-effort start of the launcher process. Never touches cached state.
    pub async fn launch(&self, id: LauncherId) -> Result<()> {
        self.launcher.launch(id).await.map_err(|err| {
            warn!(launcher = %id, error = %err, "launcher start failed");
            match err {
                LauncherError::Launch { .. } => err,
                other => LauncherError::Launch {
                    launcher: id,
                    message: other.to_string(),
                },
            }
        })
    }

    fn is_listed(&self, rule: &FileRule) -> bool {
        let state = self.state.lock();
        state.expanded == Some(rule.launcher)
            && state.files.iter().any(|listed| {
                listed.launcher == rule.launcher
                    && listed.rule_name == rule.rule_name
                    && listed.path == rule.path
            })
    }

    pub fn expanded(&self) -> Option<LauncherId> {
        self.state.lock().expanded
    }

    pub fn files(&self) -> Vec<FileRule> {
        self.state.lock().files.clone()
    }

    pub fn is_busy(&self, id: LauncherId) -> bool {
        self.state.lock().busy.contains(&id)
    }

    pub fn flagged(&self) -> Vec<LauncherId> {
        self.state.lock().flagged.iter().copied().collect()
    }

    pub fn panel_view(&self) -> PanelView {
        let state = self.state.lock();
        PanelView {
            launchers: LauncherId::ALL
                .into_iter()
                .map(|id| LauncherPanelRow {
                    id,
                    name_key: id.info().name_key,
                    desc_key: id.info().desc_key,
                    blocked: self.registry.access(id).blocked,
                    busy: state.busy.contains(&id),
                    stale: state.flagged.contains(&id),
                })
                .collect(),
            expanded: state.expanded,
            files: state.files.clone(),
        }
    }

    fn acquire(&self, id: LauncherId) -> Result<BusyGuard<'_>> {
        let mut state = self.state.lock();
        if !state.busy.insert(id) {
            debug!(launcher = %id, "toggle rejected, one is already in flight");
            return Err(LauncherError::Busy(id));
        }
        Ok(BusyGuard {
            state: &self.state,
            id,
        })
    }

    fn commit(&self, id: LauncherId, blocked: bool) {
        let mut state = self.state.lock();
        *state.epochs.entry(id).or_insert(0) += 1;
        self.registry.set_blocked(id, blocked);
    }

    fn epoch(&self, id: LauncherId) -> u64 {
        self.state.lock().epochs.get(&id).copied().unwrap_or(0)
    }
}

fn as_fetch(launcher: LauncherId, err: LauncherError) -> LauncherError {
    match err {
        LauncherError::Fetch { .. } => err,
        other => LauncherError::Fetch {
            launcher,
            message: other.to_string(),
        },
    }
}

fn as_enforcement(err: LauncherError) -> LauncherError {
    match err {
        LauncherError::Enforcement(_) => err,
        other => LauncherError::Enforcement(other.to_string()),
    }
}
