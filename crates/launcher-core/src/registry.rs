//! Process-local view of detection and access state for every launcher.
//!
//! The registry is the only owner of [`DetectionRecord`] and [`AccessState`].
//! Detection records are replaced as a whole set on every scan; access
//! state is a cache of the firewall's answer and always exists for all
//! launchers.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

use crate::launcher::LauncherId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum DetectionStatus {
    Found,
    NotFound,
    UserSkipped,
}

/// Visual treatment the web view applies to a detection row.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusBadge {
    Success,
    Warning,
    Muted,
}

impl DetectionStatus {
    pub fn badge(self) -> StatusBadge {
        match self {
            DetectionStatus::Found => StatusBadge::Success,
            DetectionStatus::NotFound => StatusBadge::Warning,
            DetectionStatus::UserSkipped => StatusBadge::Muted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    pub id: LauncherId,
    pub name: String,
    pub path: Option<PathBuf>,
    pub status: DetectionStatus,
}

impl DetectionRecord {
    /// Builds a record, demoting `Found` without a path to `NotFound`.
    pub fn new(id: LauncherId, path: Option<PathBuf>, status: DetectionStatus) -> Self {
        let status = if status == DetectionStatus::Found && path.is_none() {
            warn!(launcher = %id, "detection reported Found without a path");
            DetectionStatus::NotFound
        } else {
            status
        };
        Self {
            id,
            name: id.name().to_string(),
            path,
            status,
        }
    }

    pub fn found(id: LauncherId, path: impl Into<PathBuf>) -> Self {
        Self::new(id, Some(path.into()), DetectionStatus::Found)
    }

    pub fn not_found(id: LauncherId) -> Self {
        Self::new(id, None, DetectionStatus::NotFound)
    }

    pub fn skipped(id: LauncherId) -> Self {
        Self::new(id, None, DetectionStatus::UserSkipped)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessState {
    pub id: LauncherId,
    pub blocked: bool,
}

#[derive(Debug)]
struct Inner {
    detections: BTreeMap<LauncherId, DetectionRecord>,
    access: BTreeMap<LauncherId, AccessState>,
    scanned_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct LauncherRegistry {
    inner: RwLock<Inner>,
}

impl Default for LauncherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LauncherRegistry {
    pub fn new() -> Self {
        let access = LauncherId::ALL
            .into_iter()
            .map(|id| (id, AccessState { id, blocked: false }))
            .collect();
        Self {
            inner: RwLock::new(Inner {
                detections: BTreeMap::new(),
                access,
                scanned_at: None,
            }),
        }
    }

    /// Replaces every detection record with the result of a scan.
    pub fn replace_detection(&self, records: Vec<DetectionRecord>) {
        let mut inner = self.inner.write();
        inner.detections = records
            .into_iter()
            .map(|r| (r.id, DetectionRecord::new(r.id, r.path, r.status)))
            .collect();
        inner.scanned_at = Some(Utc::now());
    }

    pub fn mark_skipped(&self, id: LauncherId) {
        let mut inner = self.inner.write();
        let record = inner
            .detections
            .entry(id)
            .or_insert_with(|| DetectionRecord::not_found(id));
        record.status = DetectionStatus::UserSkipped;
    }

    pub fn detection(&self, id: LauncherId) -> Option<DetectionRecord> {
        self.inner.read().detections.get(&id).cloned()
    }

    /// Records in identity order; launchers never scanned are omitted.
    pub fn detections(&self) -> Vec<DetectionRecord> {
        let inner = self.inner.read();
        LauncherId::ALL
            .iter()
            .filter_map(|id| inner.detections.get(id).cloned())
            .collect()
    }

    /// Launchers that block completion: `NotFound` or never scanned.
    pub fn unresolved(&self) -> Vec<LauncherId> {
        let inner = self.inner.read();
        LauncherId::ALL
            .into_iter()
            .filter(|id| match inner.detections.get(id) {
                Some(r) => r.status == DetectionStatus::NotFound,
                None => true,
            })
            .collect()
    }

    pub fn all_found(&self) -> bool {
        let inner = self.inner.read();
        LauncherId::ALL.iter().all(|id| {
            inner
                .detections
                .get(id)
                .map(|r| r.status == DetectionStatus::Found)
                .unwrap_or(false)
        })
    }

    pub fn access(&self, id: LauncherId) -> AccessState {
        self.inner
            .read()
            .access
            .get(&id)
            .copied()
            .unwrap_or(AccessState { id, blocked: false })
    }

    pub fn accesses(&self) -> Vec<AccessState> {
        LauncherId::ALL.into_iter().map(|id| self.access(id)).collect()
    }

    pub fn set_blocked(&self, id: LauncherId, blocked: bool) {
        self.inner
            .write()
            .access
            .insert(id, AccessState { id, blocked });
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read();
        Snapshot {
            detections: LauncherId::ALL
                .iter()
                .filter_map(|id| inner.detections.get(id).cloned())
                .collect(),
            access: inner.access.values().copied().collect(),
            scanned_at: inner.scanned_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub detections: Vec<DetectionRecord>,
    pub access: Vec<AccessState>,
    pub scanned_at: Option<DateTime<Utc>>,
}
