mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{FakeEnforcement, FakeLauncher};
use launcher_core::{
    AccessControlPanel, FileRule, LauncherError, LauncherId, LauncherRegistry,
    OrchestratorSettings,
};

struct Harness {
    panel: Arc<AccessControlPanel>,
    firewall: Arc<FakeEnforcement>,
    launcher: Arc<FakeLauncher>,
}

fn harness() -> Harness {
    let firewall = FakeEnforcement::new();
    let launcher = FakeLauncher::new();
    let panel = AccessControlPanel::new(
        firewall.clone(),
        launcher.clone(),
        Arc::new(LauncherRegistry::new()),
        &OrchestratorSettings::default(),
    );
    Harness {
        panel: Arc::new(panel),
        firewall,
        launcher,
    }
}

fn blocked(panel: &AccessControlPanel, id: LauncherId) -> bool {
    panel.registry().access(id).blocked
}

#[tokio::test]
async fn toggle_blocks_and_confirms() {
    let h = harness();
    let now = h.panel.toggle(LauncherId::Epic).await.unwrap();
    assert!(now);
    assert!(blocked(&h.panel, LauncherId::Epic));
    assert_eq!(FakeEnforcement::count(&h.firewall.set_calls), 1);
    assert!(!h.panel.is_busy(LauncherId::Epic));

    assert!(!h.panel.toggle(LauncherId::Epic).await.unwrap());
    assert!(!blocked(&h.panel, LauncherId::Epic));
}

#[tokio::test]
async fn rejected_toggle_keeps_previous_state() {
    let h = harness();
    h.firewall.fail_set.store(true, Ordering::SeqCst);
    let err = h.panel.toggle(LauncherId::Steam).await.unwrap_err();
    assert!(matches!(err, LauncherError::Enforcement(_)));
    assert!(!blocked(&h.panel, LauncherId::Steam));
    assert!(!h.panel.is_busy(LauncherId::Steam));
}

#[tokio::test]
async fn second_toggle_is_rejected_while_busy() {
    let h = harness();
    let release = h.firewall.gate_next_set();
    let first = {
        let panel = h.panel.clone();
        tokio::spawn(async move { panel.toggle(LauncherId::Rockstar).await })
    };
    while !h.panel.is_busy(LauncherId::Rockstar) {
        tokio::task::yield_now().await;
    }

    let err = h.panel.toggle(LauncherId::Rockstar).await.unwrap_err();
    assert_eq!(err, LauncherError::Busy(LauncherId::Rockstar));
    assert!(h.panel.panel_view().launchers.iter().any(|row| row.busy));

    // Other launchers are unaffected.
    assert!(h.panel.toggle(LauncherId::Ea).await.unwrap());

    release.send(()).unwrap();
    assert!(first.await.unwrap().unwrap());
    assert!(blocked(&h.panel, LauncherId::Rockstar));
    assert_eq!(FakeEnforcement::count(&h.firewall.set_calls), 2);
    assert!(!h.panel.is_busy(LauncherId::Rockstar));
}

#[tokio::test]
async fn refresh_keeps_successes_when_one_launcher_fails() {
    let h = harness();
    h.firewall.set_launcher(LauncherId::Steam, true);
    h.panel.registry().set_blocked(LauncherId::Ea, true);
    h.firewall.failing_status.lock().insert(LauncherId::Ea);

    let report = h.panel.refresh_all().await;
    assert_eq!(report.updated.len(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, LauncherId::Ea);

    assert!(blocked(&h.panel, LauncherId::Steam));
    // The failed launcher keeps its cached value.
    assert!(blocked(&h.panel, LauncherId::Ea));
    assert_eq!(h.panel.flagged(), vec![LauncherId::Ea]);
    // Four launchers once, the failing one retried once.
    assert_eq!(FakeEnforcement::count(&h.firewall.status_calls), 6);

    h.firewall.failing_status.lock().clear();
    let report = h.panel.refresh_all().await;
    assert!(report.failed.is_empty());
    assert!(h.panel.flagged().is_empty());
    assert!(!blocked(&h.panel, LauncherId::Ea));
}

#[tokio::test]
async fn expanding_another_launcher_replaces_the_file_list() {
    let h = harness();
    let steam = h.panel.expand(LauncherId::Steam).await.unwrap();
    assert_eq!(steam.len(), 2);
    assert_eq!(FakeEnforcement::count(&h.firewall.list_calls), 1);

    h.panel.expand(LauncherId::Epic).await.unwrap();
    assert_eq!(FakeEnforcement::count(&h.firewall.list_calls), 2);
    assert_eq!(h.panel.expanded(), Some(LauncherId::Epic));
    assert!(h
        .panel
        .files()
        .iter()
        .all(|rule| rule.launcher == LauncherId::Epic));

    h.panel.collapse();
    assert_eq!(h.panel.expanded(), None);
    assert!(h.panel.files().is_empty());
}

#[tokio::test]
async fn failed_file_query_leaves_an_empty_list() {
    let h = harness();
    h.firewall.fail_list.store(true, Ordering::SeqCst);
    let err = h.panel.expand(LauncherId::Ubisoft).await.unwrap_err();
    assert!(matches!(
        err,
        LauncherError::Fetch {
            launcher: LauncherId::Ubisoft,
            ..
        }
    ));
    assert_eq!(h.panel.expanded(), Some(LauncherId::Ubisoft));
    assert!(h.panel.files().is_empty());
}

#[tokio::test]
async fn file_toggle_refetches_the_list_once() {
    let h = harness();
    let files = h.panel.expand(LauncherId::Rockstar).await.unwrap();
    let second = files[1].clone();
    assert!(!second.blocked);

    let refreshed = h.panel.toggle_file(&second).await.unwrap();
    assert_eq!(FakeEnforcement::count(&h.firewall.list_calls), 2);
    assert!(refreshed[1].blocked);
    assert!(!refreshed[0].blocked);
    assert_eq!(h.panel.files(), refreshed);
    // Only the first rule decides the launcher-level state.
    assert!(!blocked(&h.panel, LauncherId::Rockstar));
}

#[tokio::test]
async fn rejected_file_toggle_still_refetches() {
    let h = harness();
    let files = h.panel.expand(LauncherId::Ea).await.unwrap();
    h.firewall.fail_file_set.store(true, Ordering::SeqCst);
    // Someone else changed the other rule meanwhile.
    h.firewall.set_rule(&files[1].rule_name, true);

    let err = h.panel.toggle_file(&files[0]).await.unwrap_err();
    assert!(matches!(err, LauncherError::Enforcement(_)));
    assert_eq!(FakeEnforcement::count(&h.firewall.list_calls), 2);
    let now = h.panel.files();
    assert!(!now[0].blocked);
    assert!(now[1].blocked);
}

#[tokio::test]
async fn toggling_the_expanded_launcher_refreshes_its_files() {
    let h = harness();
    h.panel.expand(LauncherId::Steam).await.unwrap();
    h.panel.toggle(LauncherId::Steam).await.unwrap();
    assert_eq!(FakeEnforcement::count(&h.firewall.list_calls), 2);
    assert!(h.panel.files().iter().all(|rule| rule.blocked));

    h.panel.toggle(LauncherId::Epic).await.unwrap();
    assert_eq!(FakeEnforcement::count(&h.firewall.list_calls), 2);
}

#[tokio::test]
async fn launch_failure_does_not_touch_state() {
    let h = harness();
    h.panel.toggle(LauncherId::Ubisoft).await.unwrap();
    let before = h.panel.registry().accesses();

    h.launcher.fail.store(true, Ordering::SeqCst);
    let err = h.panel.launch(LauncherId::Ubisoft).await.unwrap_err();
    assert!(matches!(
        err,
        LauncherError::Launch {
            launcher: LauncherId::Ubisoft,
            ..
        }
    ));
    assert_eq!(h.panel.registry().accesses(), before);

    h.launcher.fail.store(false, Ordering::SeqCst);
    h.panel.launch(LauncherId::Ubisoft).await.unwrap();
    assert_eq!(*h.launcher.launched.lock(), vec![LauncherId::Ubisoft]);
}

#[tokio::test]
async fn slower_list_for_an_earlier_expand_is_not_shown() {
    let h = harness();
    let release = h.firewall.gate_next_list();
    let epic = {
        let panel = h.panel.clone();
        tokio::spawn(async move { panel.expand(LauncherId::Epic).await })
    };
    while FakeEnforcement::count(&h.firewall.list_calls) < 1 {
        tokio::task::yield_now().await;
    }

    let steam = h.panel.expand(LauncherId::Steam).await.unwrap();
    release.send(()).unwrap();
    let epic = epic.await.unwrap().unwrap();
    assert!(epic.iter().all(|f| f.launcher == LauncherId::Epic));

    assert_eq!(h.panel.expanded(), Some(LauncherId::Steam));
    assert_eq!(h.panel.files(), steam);
}

#[tokio::test]
async fn status_read_from_before_a_toggle_does_not_undo_it() {
    let h = harness();
    let release = h.firewall.gate_next_status();
    let refresh = {
        let panel = h.panel.clone();
        tokio::spawn(async move { panel.refresh_all().await })
    };
    // The refresh has read Steam as unblocked and is parked.
    while FakeEnforcement::count(&h.firewall.status_calls) < 1 {
        tokio::task::yield_now().await;
    }

    assert!(h.panel.toggle(LauncherId::Steam).await.unwrap());
    release.send(()).unwrap();
    let report = refresh.await.unwrap();

    assert!(report.failed.is_empty());
    assert!(blocked(&h.panel, LauncherId::Steam));
    let steam = report
        .updated
        .iter()
        .find(|s| s.id == LauncherId::Steam)
        .unwrap();
    assert!(steam.blocked);
}

#[tokio::test]
async fn file_toggle_for_an_unlisted_rule_is_refused() {
    let h = harness();
    let files = h.panel.expand(LauncherId::Steam).await.unwrap();
    let foreign = FileRule {
        launcher: LauncherId::Steam,
        path: r"C:\Windows\System32\svchost.exe".to_string(),
        rule_name: files[0].rule_name.clone(),
        blocked: false,
    };

    let err = h.panel.toggle_file(&foreign).await.unwrap_err();
    assert!(matches!(err, LauncherError::Enforcement(_)));
    assert_eq!(FakeEnforcement::count(&h.firewall.file_set_calls), 0);
    assert_eq!(FakeEnforcement::count(&h.firewall.list_calls), 2);
    assert_eq!(h.panel.files(), files);
    assert!(!blocked(&h.panel, LauncherId::Steam));
}

#[tokio::test]
async fn set_blocked_drives_the_requested_state() {
    let h = harness();
    assert!(h.panel.set_blocked(LauncherId::Ea, true).await.unwrap());
    assert!(h.panel.set_blocked(LauncherId::Ea, true).await.unwrap());
    assert!(blocked(&h.panel, LauncherId::Ea));
    assert!(!h.panel.set_blocked(LauncherId::Ea, false).await.unwrap());
    assert_eq!(FakeEnforcement::count(&h.firewall.set_calls), 3);
    assert!(!h.panel.is_busy(LauncherId::Ea));
}
