//! First-run flow: find every launcher's executable and decide when
//! onboarding may be marked complete.
//!
//! ```text
//! Scanning ──┬─ all Found ──> AutoCompleting ── delay ──> Complete
//!            └─ otherwise ──> Reviewing ──┬─ finish (nothing NotFound) ──> Complete
//!                                         └─ request_skip_all ──> SkipWarning
//!                                               ├─ confirm_skip ──> Complete
//!                                               └─ cancel_skip ──> Reviewing
//! ```
//!
//! Scans are ordered by a sequence number: only the most recently issued
//! scan may update the registry. The auto-complete timer is a spawned task
//! that holds a weak reference to the session; any manual action, a new
//! scan, `teardown` or dropping the session cancels it.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::{CompletionStore, DetectionBackend, PathChooser};
use crate::error::{LauncherError, Result};
use crate::launcher::LauncherId;
use crate::registry::{DetectionRecord, LauncherRegistry, StatusBadge};
use crate::settings::OrchestratorSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OnboardingPhase {
    Scanning,
    Reviewing,
    AutoCompleting,
    SkipWarning,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scan was the latest one issued and its records were applied.
    Applied(OnboardingPhase),
    /// A newer scan was issued before this one returned.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Rescanned(ScanOutcome),
    /// The operator closed the file chooser.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherRow {
    #[serde(flatten)]
    pub record: DetectionRecord,
    pub badge: StatusBadge,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingView {
    pub phase: OnboardingPhase,
    pub launchers: Vec<LauncherRow>,
    pub can_finish: bool,
    pub unresolved: Vec<LauncherId>,
}

struct Session {
    phase: OnboardingPhase,
    issued_scan: u64,
    /// Last scan whose result was applied or failed. Equal to
    /// `issued_scan` when no scan is in flight.
    settled_scan: u64,
    timer: Option<JoinHandle<()>>,
    timer_generation: u64,
    /// Launchers skipped while a scan was running. Re-applied on top of
    /// that scan's records.
    pending_skips: BTreeSet<LauncherId>,
}

struct Shared {
    detector: Arc<dyn DetectionBackend>,
    chooser: Arc<dyn PathChooser>,
    store: Arc<dyn CompletionStore>,
    registry: Arc<LauncherRegistry>,
    delay: Duration,
    session: Mutex<Session>,
    /// Set once the completion flag has been written by this session.
    persisted: AsyncMutex<bool>,
    phase_tx: watch::Sender<OnboardingPhase>,
}

impl Shared {
    fn set_phase(&self, session: &mut Session, phase: OnboardingPhase) {
        if session.phase != phase {
            debug!(from = ?session.phase, to = ?phase, "onboarding phase change");
        }
        session.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    fn cancel_timer(&self, session: &mut Session) {
        session.timer_generation += 1;
        if let Some(handle) = session.timer.take() {
            handle.abort();
            info!("auto-complete cancelled");
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.session.get_mut().timer.take() {
            handle.abort();
        }
    }
}

#[derive(Clone)]
pub struct OnboardingStateMachine {
    shared: Arc<Shared>,
}

impl OnboardingStateMachine {
    pub fn new(
        detector: Arc<dyn DetectionBackend>,
        chooser: Arc<dyn PathChooser>,
        store: Arc<dyn CompletionStore>,
        registry: Arc<LauncherRegistry>,
        settings: &OrchestratorSettings,
    ) -> Self {
        let (phase_tx, _) = watch::channel(OnboardingPhase::Scanning);
        Self {
            shared: Arc::new(Shared {
                detector,
                chooser,
                store,
                registry,
                delay: settings.auto_complete_delay(),
                session: Mutex::new(Session {
                    phase: OnboardingPhase::Scanning,
                    issued_scan: 0,
                    settled_scan: 0,
                    timer: None,
                    timer_generation: 0,
                    pending_skips: BTreeSet::new(),
                }),
                persisted: AsyncMutex::new(false),
                phase_tx,
            }),
        }
    }

    /// Whether onboarding still has to run for this installation.
    pub async fn is_required(store: &dyn CompletionStore) -> Result<bool> {
        Ok(!store.is_complete().await?)
    }

    /// Clears the completion flag so the next launch runs onboarding again.
    pub async fn reset(store: &dyn CompletionStore) -> Result<()> {
        store.reset().await?;
        info!("onboarding reset requested");
        Ok(())
    }

    pub fn phase(&self) -> OnboardingPhase {
        self.shared.session.lock().phase
    }

    /// Phase changes, including the final `Complete`.
    pub fn subscribe(&self) -> watch::Receiver<OnboardingPhase> {
        self.shared.phase_tx.subscribe()
    }

    pub fn registry(&self) -> &Arc<LauncherRegistry> {
        &self.shared.registry
    }

    /// The primary finish action is allowed only when nothing is `NotFound`.
    pub fn can_finish(&self) -> bool {
        self.shared.registry.unresolved().is_empty()
    }

    pub fn snapshot(&self) -> OnboardingView {
        let phase = self.phase();
        let unresolved = self.shared.registry.unresolved();
        OnboardingView {
            phase,
            launchers: self
                .shared
                .registry
                .detections()
                .into_iter()
                .map(|record| LauncherRow {
                    badge: record.status.badge(),
                    record,
                })
                .collect(),
            can_finish: unresolved.is_empty(),
            unresolved,
        }
    }

    /// Scans every launcher and moves to `AutoCompleting` or `Reviewing`.
    pub async fn start(&self) -> Result<ScanOutcome> {
        let seq = {
            let mut session = self.shared.session.lock();
            ensure_open(&session)?;
            session.issued_scan += 1;
            self.shared.cancel_timer(&mut session);
            self.shared.set_phase(&mut session, OnboardingPhase::Scanning);
            session.issued_scan
        };
        info!(scan = seq, "launcher scan issued");

        let result = self.shared.detector.detect_all().await;

        let mut session = self.shared.session.lock();
        if seq != session.issued_scan || session.phase == OnboardingPhase::Complete {
            debug!(scan = seq, latest = session.issued_scan, "discarding superseded scan");
            return Ok(ScanOutcome::Superseded);
        }

        session.settled_scan = seq;
        let pending_skips = std::mem::take(&mut session.pending_skips);
        let records = match result {
            Ok(records) => records,
            Err(err) => {
                warn!(scan = seq, error = %err, "launcher scan failed");
                if session.phase == OnboardingPhase::Scanning {
                    self.shared.set_phase(&mut session, OnboardingPhase::Reviewing);
                }
                return Err(as_detection(err));
            }
        };

        self.shared.registry.replace_detection(records);
        for id in pending_skips {
            debug!(scan = seq, launcher = %id, "keeping skip made during the scan");
            self.shared.registry.mark_skipped(id);
        }
        // The operator asked to skip while the scan was running; keep the
        // warning up instead of scheduling completion behind it.
        let phase = if session.phase == OnboardingPhase::SkipWarning {
            OnboardingPhase::SkipWarning
        } else if self.shared.registry.all_found() {
            self.schedule_auto_complete(&mut session);
            OnboardingPhase::AutoCompleting
        } else {
            OnboardingPhase::Reviewing
        };
        self.shared.set_phase(&mut session, phase);
        info!(scan = seq, phase = ?phase, "launcher scan applied");
        Ok(ScanOutcome::Applied(phase))
    }

    /// Lets the operator pick the executable for `id`, saves it and rescans
    /// every launcher.
    pub async fn resolve_path(&self, id: LauncherId) -> Result<ResolveOutcome> {
        self.interrupt()?;

        let Some(path) = self.shared.chooser.choose_executable(id).await else {
            debug!(launcher = %id, "path selection cancelled");
            return Ok(ResolveOutcome::Cancelled);
        };

        if let Err(err) = self.shared.detector.save_manual_path(id, &path).await {
            warn!(launcher = %id, error = %err, "saving manual path failed");
            return Err(as_detection(err));
        }
        info!(launcher = %id, path = %path.display(), "manual path saved");
        self.shared.session.lock().pending_skips.remove(&id);

        let outcome = self.start().await?;
        Ok(ResolveOutcome::Rescanned(outcome))
    }

    /// Marks one launcher as not installed without rescanning the others.
    pub async fn skip(&self, id: LauncherId) -> Result<()> {
        self.interrupt()?;
        if let Err(err) = self.shared.detector.skip(id).await {
            warn!(launcher = %id, error = %err, "skip failed");
            return Err(as_detection(err));
        }
        {
            let mut session = self.shared.session.lock();
            if session.issued_scan != session.settled_scan {
                session.pending_skips.insert(id);
            }
            self.shared.registry.mark_skipped(id);
        }
        info!(launcher = %id, "launcher skipped");
        Ok(())
    }

    pub fn request_skip_all(&self) -> Result<()> {
        let mut session = self.shared.session.lock();
        ensure_open(&session)?;
        self.shared.cancel_timer(&mut session);
        self.shared.set_phase(&mut session, OnboardingPhase::SkipWarning);
        Ok(())
    }

    /// Completes onboarding despite outstanding `NotFound` records.
    pub async fn confirm_skip(&self) -> Result<()> {
        {
            let session = self.shared.session.lock();
            if session.phase != OnboardingPhase::SkipWarning {
                return Err(LauncherError::InvalidState(
                    "skip was not requested".to_string(),
                ));
            }
        }
        self.complete().await
    }

    pub fn cancel_skip(&self) -> Result<()> {
        let mut session = self.shared.session.lock();
        if session.phase != OnboardingPhase::SkipWarning {
            return Err(LauncherError::InvalidState(
                "skip was not requested".to_string(),
            ));
        }
        self.shared.set_phase(&mut session, OnboardingPhase::Reviewing);
        Ok(())
    }

    /// The gated primary action.
    pub async fn finish(&self) -> Result<()> {
        {
            let session = self.shared.session.lock();
            ensure_open(&session)?;
            if session.phase == OnboardingPhase::Scanning {
                return Err(LauncherError::InvalidState(
                    "a launcher scan is still running".to_string(),
                ));
            }
        }
        let unresolved = self.shared.registry.unresolved();
        if !unresolved.is_empty() {
            return Err(LauncherError::Unresolved(unresolved));
        }
        self.complete().await
    }

    /// Persists the completion flag once and moves to `Complete`.
    pub async fn complete(&self) -> Result<()> {
        let mut persisted = self.shared.persisted.lock().await;
        if !*persisted {
            self.shared.store.mark_complete().await.map_err(|err| {
                error!(error = %err, "persisting onboarding completion failed");
                match err {
                    LauncherError::Persistence(_) => err,
                    other => LauncherError::Persistence(other.to_string()),
                }
            })?;
            *persisted = true;
            info!("onboarding marked complete");
        }

        let mut session = self.shared.session.lock();
        self.shared.cancel_timer(&mut session);
        self.shared.set_phase(&mut session, OnboardingPhase::Complete);
        Ok(())
    }

    /// Cancels the pending auto-complete, if any.
    pub fn teardown(&self) {
        let mut session = self.shared.session.lock();
        self.shared.cancel_timer(&mut session);
    }

    /// A manual action supersedes a pending auto-complete.
    fn interrupt(&self) -> Result<()> {
        let mut session = self.shared.session.lock();
        ensure_open(&session)?;
        self.shared.cancel_timer(&mut session);
        if session.phase == OnboardingPhase::AutoCompleting {
            self.shared.set_phase(&mut session, OnboardingPhase::Reviewing);
        }
        Ok(())
    }

    fn schedule_auto_complete(&self, session: &mut Session) {
        self.shared.cancel_timer(session);
        let generation = session.timer_generation;
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let delay = self.shared.delay;
        info!(delay_ms = delay.as_millis() as u64, "auto-complete scheduled");
        session.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            OnboardingStateMachine { shared }
                .fire_auto_complete(generation)
                .await;
        }));
    }

    async fn fire_auto_complete(&self, generation: u64) {
        {
            let mut session = self.shared.session.lock();
            if session.timer_generation != generation
                || session.phase != OnboardingPhase::AutoCompleting
            {
                debug!("stale auto-complete timer ignored");
                return;
            }
            // Detach our own handle so completion does not abort this task.
            session.timer = None;
        }

        info!("auto-completing onboarding");
        if let Err(err) = self.complete().await {
            warn!(error = %err, "auto-complete failed, waiting for operator");
            let mut session = self.shared.session.lock();
            if session.phase == OnboardingPhase::AutoCompleting {
                self.shared.set_phase(&mut session, OnboardingPhase::Reviewing);
            }
        }
    }
}

fn ensure_open(session: &Session) -> Result<()> {
    if session.phase == OnboardingPhase::Complete {
        return Err(LauncherError::InvalidState(
            "onboarding is already complete".to_string(),
        ));
    }
    Ok(())
}

fn as_detection(err: LauncherError) -> LauncherError {
    match err {
        LauncherError::Detection(_) => err,
        other => LauncherError::Detection(other.to_string()),
    }
}
