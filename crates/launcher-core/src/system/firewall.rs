//! Windows Defender Firewall rules via `netsh`.
//!
//! Each executable of a launcher gets one outbound block rule. Steam's
//! rules have fixed names; every other launcher uses
//! `Block <key> App <n>`, numbered from 1 in catalog order. A launcher
//! counts as blocked when its first rule exists.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::{EnforcementBackend, FileRuleEntry};
use crate::error::{LauncherError, Result};
use crate::launcher::{Anchor, LauncherId, LauncherInfo};
use crate::storage::KvStore;
use crate::system::runner::{CommandOutput, CommandRunner};
use crate::system::{join_relative, locate, resolve_primary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTarget {
    pub rule_name: String,
    pub path: PathBuf,
}

#[derive(Clone)]
pub struct NetshFirewall {
    store: Arc<KvStore>,
    runner: Arc<dyn CommandRunner>,
}

impl NetshFirewall {
    pub fn new(store: Arc<KvStore>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { store, runner }
    }

    /// Every executable blocked for `id`, main binary first.
    pub fn targets(&self, id: LauncherId) -> Result<Vec<RuleTarget>> {
        let info = id.info();
        let primary = resolve_primary(&self.store, id)?
            .unwrap_or_else(|| PathBuf::from(info.candidates[0]));
        let base = primary.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut targets = vec![RuleTarget {
            rule_name: rule_name(info, 0, info.primary_rule),
            path: primary,
        }];
        for (index, companion) in info.companions.iter().enumerate() {
            let path = match companion.anchor {
                Anchor::LauncherDir => join_relative(&base, companion.relative),
                Anchor::SteamApp { app_id, fallback } => {
                    let dir = locate::steam_app_dir(app_id)
                        .unwrap_or_else(|| PathBuf::from(fallback));
                    join_relative(&dir, companion.relative)
                }
            };
            targets.push(RuleTarget {
                rule_name: rule_name(info, index + 1, companion.rule),
                path,
            });
        }
        Ok(targets)
    }

    /// The catalog entry with this rule name, across all launchers.
    fn known_target(&self, rule_name: &str) -> Result<Option<RuleTarget>> {
        for id in LauncherId::ALL {
            if let Some(target) = self
                .targets(id)?
                .into_iter()
                .find(|t| t.rule_name == rule_name)
            {
                return Ok(Some(target));
            }
        }
        Ok(None)
    }

    pub fn rule_exists(&self, rule_name: &str) -> Result<bool> {
        let script = format!("Get-NetFirewallRule -DisplayName {}", ps_literal(rule_name));
        let output = self.runner.run(
            "powershell",
            &[
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                script,
            ],
        )?;
        Ok(output.success)
    }

    fn add_rule(&self, rule_name: &str, path: &str) -> Result<CommandOutput> {
        Ok(self.runner.run(
            "netsh",
            &netsh_args(&[
                "add",
                "rule",
                &format!("name={rule_name}"),
                "dir=out",
                "action=block",
                &format!("program={path}"),
                "enable=yes",
            ]),
        )?)
    }

    fn delete_rule(&self, rule_name: &str) -> Result<CommandOutput> {
        Ok(self.runner.run(
            "netsh",
            &netsh_args(&["delete", "rule", &format!("name={rule_name}")]),
        )?)
    }

    /// Sets one rule and confirms the result by reading it back.
    fn apply(&self, rule_name: &str, path: &str, blocked: bool) -> Result<()> {
        // Drop any stale rule of the same name so adds never duplicate.
        let deleted = self.delete_rule(rule_name)?;
        debug!(rule = rule_name, removed = deleted.success, "firewall rule cleared");

        if blocked {
            let added = self.add_rule(rule_name, path)?;
            if !added.success {
                warn!(rule = rule_name, output = %added.message(), "netsh add rule failed");
                return Err(LauncherError::Enforcement(format!(
                    "could not add rule '{rule_name}': {}",
                    added.message()
                )));
            }
        }

        if self.rule_exists(rule_name)? != blocked {
            return Err(LauncherError::Enforcement(format!(
                "rule '{rule_name}' did not change (wanted blocked={blocked})"
            )));
        }
        Ok(())
    }

    fn set_blocked_now(&self, id: LauncherId, blocked: bool) -> Result<()> {
        for target in self.targets(id)? {
            self.apply(&target.rule_name, &target.path.to_string_lossy(), blocked)?;
        }
        Ok(())
    }

    /// Only rules from the catalog may be changed one at a time, and only
    /// for the executable the catalog assigns them.
    fn set_file_rule_now(&self, rule_name: &str, path: &str, blocked: bool) -> Result<()> {
        let target = self.known_target(rule_name)?.ok_or_else(|| {
            LauncherError::Enforcement(format!("'{rule_name}' is not a launcher rule"))
        })?;
        if target.path.to_string_lossy() != path {
            return Err(LauncherError::Enforcement(format!(
                "rule '{rule_name}' covers {}, not {path}",
                target.path.display()
            )));
        }
        self.apply(rule_name, path, blocked)
    }

    fn list_now(&self, id: LauncherId) -> Result<Vec<FileRuleEntry>> {
        self.targets(id)?
            .into_iter()
            .map(|target| {
                Ok(FileRuleEntry {
                    blocked: self.rule_exists(&target.rule_name)?,
                    path: target.path.to_string_lossy().into_owned(),
                    rule_name: target.rule_name,
                })
            })
            .collect()
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(NetshFirewall) -> Result<T> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(this))
            .await
            .map_err(|e| LauncherError::Enforcement(format!("firewall task failed: {e}")))?
    }
}

#[async_trait]
impl EnforcementBackend for NetshFirewall {
    async fn get_status(&self, id: LauncherId) -> Result<bool> {
        self.blocking(move |fw| {
            let first = fw
                .targets(id)?
                .into_iter()
                .next()
                .ok_or_else(|| LauncherError::UnknownLauncher(id.key().to_string()))?;
            fw.rule_exists(&first.rule_name)
        })
        .await
    }

    async fn set_blocked(&self, id: LauncherId, blocked: bool) -> Result<()> {
        self.blocking(move |fw| fw.set_blocked_now(id, blocked)).await
    }

    async fn list_file_rules(&self, id: LauncherId) -> Result<Vec<FileRuleEntry>> {
        self.blocking(move |fw| fw.list_now(id)).await
    }

    async fn set_file_rule(&self, rule_name: &str, path: &str, blocked: bool) -> Result<()> {
        let rule_name = rule_name.to_string();
        let path = path.to_string();
        self.blocking(move |fw| fw.set_file_rule_now(&rule_name, &path, blocked))
            .await
    }
}

fn rule_name(info: &LauncherInfo, index: usize, fixed: Option<&str>) -> String {
    fixed
        .map(str::to_string)
        .unwrap_or_else(|| format!("Block {} App {}", info.key, index + 1))
}

fn netsh_args(rest: &[&str]) -> Vec<String> {
    ["advfirewall", "firewall"]
        .iter()
        .chain(rest.iter())
        .map(|s| s.to_string())
        .collect()
}

/// PowerShell single-quoted literal. PowerShell also ends such strings
/// at typographic single quotes, so those are doubled too.
fn ps_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            out.push(c);
        }
        out.push(c);
    }
    out.push('\'');
    out
}
