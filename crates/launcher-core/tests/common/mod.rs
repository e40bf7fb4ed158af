#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

use launcher_core::backend::{
    CompletionStore, DetectionBackend, EnforcementBackend, FileRuleEntry, GameLibrary,
    PathChooser, ProcessLauncher,
};
use launcher_core::{DetectionRecord, LauncherError, LauncherId, Result, SteamGame};

pub fn fake_path(id: LauncherId) -> PathBuf {
    PathBuf::from(format!(r"C:\Games\{}\launcher.exe", id.key()))
}

/// One record per launcher: `Found` for the listed ids, `NotFound` otherwise.
pub fn records(found: &[LauncherId]) -> Vec<DetectionRecord> {
    LauncherId::ALL
        .into_iter()
        .map(|id| {
            if found.contains(&id) {
                DetectionRecord::found(id, fake_path(id))
            } else {
                DetectionRecord::not_found(id)
            }
        })
        .collect()
}

pub fn all_but(missing: LauncherId) -> Vec<DetectionRecord> {
    let found: Vec<_> = LauncherId::ALL.into_iter().filter(|id| *id != missing).collect();
    records(&found)
}

struct Scripted {
    result: Result<Vec<DetectionRecord>>,
    gate: Option<oneshot::Receiver<()>>,
}

/// Detector that answers from a queue of scripted scans, then from a
/// default set that saved manual paths update.
pub struct FakeDetector {
    script: Mutex<VecDeque<Scripted>>,
    default: Mutex<Vec<DetectionRecord>>,
    pub scans: AtomicUsize,
    pub saved: Mutex<Vec<(LauncherId, PathBuf)>>,
    pub skipped: Mutex<Vec<LauncherId>>,
    pub fail_save: AtomicBool,
}

impl FakeDetector {
    pub fn new(default: Vec<DetectionRecord>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            scans: AtomicUsize::new(0),
            saved: Mutex::new(Vec::new()),
            skipped: Mutex::new(Vec::new()),
            fail_save: AtomicBool::new(false),
        })
    }

    pub fn push(&self, records: Vec<DetectionRecord>) {
        self.script.lock().push_back(Scripted {
            result: Ok(records),
            gate: None,
        });
    }

    /// Queues a scan that only returns once the sender fires.
    pub fn push_gated(&self, records: Vec<DetectionRecord>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().push_back(Scripted {
            result: Ok(records),
            gate: Some(rx),
        });
        tx
    }

    pub fn push_failure(&self, message: &str) {
        self.script.lock().push_back(Scripted {
            result: Err(LauncherError::Io(message.to_string())),
            gate: None,
        });
    }

    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionBackend for FakeDetector {
    async fn detect_all(&self) -> Result<Vec<DetectionRecord>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted { result, gate }) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                result
            }
            None => Ok(self.default.lock().clone()),
        }
    }

    async fn save_manual_path(&self, id: LauncherId, path: &Path) -> Result<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(LauncherError::Io("settings file is read-only".to_string()));
        }
        self.saved.lock().push((id, path.to_path_buf()));
        let mut default = self.default.lock();
        if let Some(record) = default.iter_mut().find(|r| r.id == id) {
            *record = DetectionRecord::found(id, path);
        }
        Ok(())
    }

    async fn skip(&self, id: LauncherId) -> Result<()> {
        self.skipped.lock().push(id);
        Ok(())
    }
}

pub struct FakeChooser {
    answer: Mutex<Option<PathBuf>>,
    pub asked: AtomicUsize,
}

impl FakeChooser {
    pub fn answering(answer: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(answer),
            asked: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PathChooser for FakeChooser {
    async fn choose_executable(&self, _id: LauncherId) -> Option<PathBuf> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().clone()
    }
}

#[derive(Default)]
pub struct MemoryCompletion {
    complete: AtomicBool,
    pub fail: AtomicBool,
    /// Successful writes of the flag.
    pub writes: AtomicUsize,
}

impl MemoryCompletion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionStore for MemoryCompletion {
    async fn is_complete(&self) -> Result<bool> {
        Ok(self.complete.load(Ordering::SeqCst))
    }

    async fn mark_complete(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LauncherError::Persistence("disk full".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.complete.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.complete.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory firewall. Every launcher owns two file rules; the launcher is
/// blocked when its first rule is.
#[derive(Default)]
pub struct FakeEnforcement {
    rules: Mutex<HashMap<String, bool>>,
    pub failing_status: Mutex<HashSet<LauncherId>>,
    pub fail_set: AtomicBool,
    pub fail_file_set: AtomicBool,
    pub fail_list: AtomicBool,
    set_gate: Mutex<Option<oneshot::Receiver<()>>>,
    status_gate: Mutex<Option<oneshot::Receiver<()>>>,
    list_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub status_calls: AtomicUsize,
    pub set_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub file_set_calls: AtomicUsize,
}

impl FakeEnforcement {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rule_names(id: LauncherId) -> [String; 2] {
        [
            format!("Block {} App 1", id.key()),
            format!("Block {} App 2", id.key()),
        ]
    }

    pub fn set_rule(&self, name: &str, blocked: bool) {
        self.rules.lock().insert(name.to_string(), blocked);
    }

    pub fn set_launcher(&self, id: LauncherId, blocked: bool) {
        for name in Self::rule_names(id) {
            self.set_rule(&name, blocked);
        }
    }

    /// Holds the next `set_blocked` until the sender fires.
    pub fn gate_next_set(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.set_gate.lock() = Some(rx);
        tx
    }

    /// The next `get_status` reads the rule at once but only answers when
    /// the sender fires, so it can return a value that is stale by then.
    pub fn gate_next_status(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.status_gate.lock() = Some(rx);
        tx
    }

    /// Holds the next `list_file_rules` until the sender fires.
    pub fn gate_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.list_gate.lock() = Some(rx);
        tx
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn rule(&self, name: &str) -> bool {
        self.rules.lock().get(name).copied().unwrap_or(false)
    }
}

#[async_trait]
impl EnforcementBackend for FakeEnforcement {
    async fn get_status(&self, id: LauncherId) -> Result<bool> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_status.lock().contains(&id) {
            return Err(LauncherError::Io("powershell timed out".to_string()));
        }
        let [first, _] = Self::rule_names(id);
        let blocked = self.rule(&first);
        let gate = self.status_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(blocked)
    }

    async fn set_blocked(&self, id: LauncherId, blocked: bool) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.set_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(LauncherError::Enforcement("access denied".to_string()));
        }
        self.set_launcher(id, blocked);
        Ok(())
    }

    async fn list_file_rules(&self, id: LauncherId) -> Result<Vec<FileRuleEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(LauncherError::Io("netsh unavailable".to_string()));
        }
        Ok(Self::rule_names(id)
            .into_iter()
            .enumerate()
            .map(|(n, rule_name)| FileRuleEntry {
                path: format!(r"C:\Games\{}\app{}.exe", id.key(), n + 1),
                blocked: self.rule(&rule_name),
                rule_name,
            })
            .collect())
    }

    async fn set_file_rule(&self, rule_name: &str, _path: &str, blocked: bool) -> Result<()> {
        self.file_set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_file_set.load(Ordering::SeqCst) {
            return Err(LauncherError::Enforcement("access denied".to_string()));
        }
        self.set_rule(rule_name, blocked);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLauncher {
    pub fail: AtomicBool,
    pub launched: Mutex<Vec<LauncherId>>,
}

impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(&self, id: LauncherId) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LauncherError::Io("file not found".to_string()));
        }
        self.launched.lock().push(id);
        Ok(())
    }
}

/// Steam client stand-in that records the order of calls.
#[derive(Default)]
pub struct FakeLibrary {
    pub games: Mutex<Vec<SteamGame>>,
    pub fail_list: AtomicBool,
    pub fail_offline: AtomicBool,
    pub fail_launch: AtomicBool,
    pub offline_modes: Mutex<Vec<bool>>,
    pub launched: Mutex<Vec<u32>>,
}

impl FakeLibrary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl GameLibrary for FakeLibrary {
    async fn installed_games(&self) -> Result<Vec<SteamGame>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(LauncherError::Io("libraryfolders.vdf missing".to_string()));
        }
        Ok(self.games.lock().clone())
    }

    async fn set_offline_mode(&self, offline: bool) -> Result<()> {
        if self.fail_offline.load(Ordering::SeqCst) {
            return Err(LauncherError::Io("loginusers.vdf is locked".to_string()));
        }
        self.offline_modes.lock().push(offline);
        Ok(())
    }

    async fn launch_app(&self, app_id: u32) -> Result<()> {
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(LauncherError::Io("steam.exe not found".to_string()));
        }
        self.launched.lock().push(app_id);
        Ok(())
    }
}
