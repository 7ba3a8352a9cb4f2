//! Enable, profile add and orphan removal through the registrar

mod common;

use common::{FailingRebuilder, RecordingRebuilder, TestVolt};
use pretty_assertions::assert_eq;
use volt_core::profile::{find_profile, Profile};
use volt_core::reconcile::find_orphans;
use volt_core::{normalize_repos, Registrar, ReposPath, VoltError};

/// Import each `user/name` and then disable everything, so tests start from
/// installed-but-not-enabled repositories
fn install_disabled(volt: &TestVolt, names: &[&str]) -> Vec<ReposPath> {
    let rebuilder = RecordingRebuilder::default();
    let registrar = Registrar::new(&volt.paths, &rebuilder);
    let mut installed = Vec::new();
    for name in names {
        let repos_path = normalize_repos(name).unwrap();
        let short = name.rsplit('/').next().unwrap();
        registrar
            .import(&volt.plugin_source(short, false), &repos_path)
            .unwrap();
        installed.push(repos_path);
    }

    let mut lock = volt.lock();
    lock.profiles[0].repos_path.clear();
    lock.profiles.push(Profile::new("work"));
    lock.save_to_path(&volt.paths.lock_json()).unwrap();
    installed
}

#[test]
fn test_enable_batch_equals_sequential_enables() {
    let batch_volt = TestVolt::new();
    let repos = install_disabled(&batch_volt, &["a/b", "c/d"]);
    let rebuilder = RecordingRebuilder::default();
    Registrar::new(&batch_volt.paths, &rebuilder)
        .enable(&repos)
        .unwrap();

    let seq_volt = TestVolt::new();
    install_disabled(&seq_volt, &["a/b", "c/d"]);
    let seq_rebuilder = RecordingRebuilder::default();
    let registrar = Registrar::new(&seq_volt.paths, &seq_rebuilder);
    registrar.enable(&repos[..1]).unwrap();
    registrar.enable(&repos[1..]).unwrap();

    let batch = batch_volt.lock();
    let sequential = seq_volt.lock();
    assert_eq!(
        find_profile(&batch, "default").unwrap().repos_path,
        find_profile(&sequential, "default").unwrap().repos_path
    );
    assert_eq!(find_profile(&batch, "default").unwrap().repos_path, repos);

    // The batch is one persist and one rebuild
    assert_eq!(rebuilder.calls.get(), 1);
    assert_eq!(seq_rebuilder.calls.get(), 2);
}

#[test]
fn test_enable_increments_trx_id_once_per_batch() {
    let volt = TestVolt::new();
    let repos = install_disabled(&volt, &["a/b", "c/d"]);
    let before = volt.lock().trx_id;

    let rebuilder = RecordingRebuilder::default();
    let change = Registrar::new(&volt.paths, &rebuilder)
        .enable(&repos)
        .unwrap();

    assert_eq!(change.profile, "default");
    assert_eq!(change.added, repos);
    assert_eq!(volt.lock().trx_id, before + 1);
}

#[test]
fn test_enable_already_enabled_writes_nothing() {
    let volt = TestVolt::new();
    let repos = install_disabled(&volt, &["a/b"]);
    let rebuilder = RecordingRebuilder::default();
    let registrar = Registrar::new(&volt.paths, &rebuilder);
    registrar.enable(&repos).unwrap();
    let before = volt.lock_bytes();

    let change = registrar.enable(&repos).unwrap();

    assert!(change.is_noop());
    assert_eq!(change.unchanged, repos);
    assert_eq!(volt.lock_bytes(), before);
    // Still rebuilt, from the unchanged lock.json
    assert_eq!(rebuilder.calls.get(), 2);
    assert!(!volt.paths.trx_lock().exists());
}

#[test]
fn test_enable_retries_rebuild_after_failed_import() {
    let volt = TestVolt::new();
    let repos_path = normalize_repos("tyru/caw.vim").unwrap();
    let err = Registrar::new(&volt.paths, &FailingRebuilder)
        .import(&volt.plugin_source("caw.vim", false), &repos_path)
        .unwrap_err();
    assert!(matches!(err, VoltError::RebuildFailed { .. }));
    let before = volt.lock_bytes();

    let rebuilder = RecordingRebuilder::default();
    let change = Registrar::new(&volt.paths, &rebuilder)
        .enable(&[repos_path.clone()])
        .unwrap();

    assert!(change.is_noop());
    assert_eq!(rebuilder.calls.get(), 1);
    assert_eq!(rebuilder.last.borrow().as_ref(), Some(&volt.lock()));
    assert_eq!(volt.lock_bytes(), before);
}

#[test]
fn test_noop_add_to_other_profile_skips_rebuild() {
    let volt = TestVolt::new();
    let repos = install_disabled(&volt, &["a/b"]);
    let rebuilder = RecordingRebuilder::default();
    let registrar = Registrar::new(&volt.paths, &rebuilder);
    registrar.add_to_profile(Some("work"), &repos).unwrap();

    let change = registrar.add_to_profile(Some("work"), &repos).unwrap();

    assert!(change.is_noop());
    assert_eq!(rebuilder.calls.get(), 0);
}

#[test]
fn test_enable_unknown_repository_changes_nothing() {
    let volt = TestVolt::new();
    let mut repos = install_disabled(&volt, &["a/b"]);
    repos.push(normalize_repos("not/installed").unwrap());
    let before = volt.lock_bytes();

    let rebuilder = RecordingRebuilder::default();
    let err = Registrar::new(&volt.paths, &rebuilder)
        .enable(&repos)
        .unwrap_err();

    assert!(matches!(err, VoltError::ReposNotFound { .. }));
    assert_eq!(volt.lock_bytes(), before);
    assert_eq!(rebuilder.calls.get(), 0);
    assert!(!volt.paths.trx_lock().exists());
}

#[test]
fn test_enable_while_transaction_held_fails_immediately() {
    let volt = TestVolt::new();
    let repos = install_disabled(&volt, &["a/b"]);
    volt.hold_transaction();
    let before = volt.lock_bytes();
    let tree_before = volt.tree();

    let rebuilder = RecordingRebuilder::default();
    let err = Registrar::new(&volt.paths, &rebuilder)
        .enable(&repos)
        .unwrap_err();

    assert!(matches!(err, VoltError::TransactionInProgress { .. }));
    assert_eq!(volt.lock_bytes(), before);
    assert_eq!(volt.tree(), tree_before);
}

#[test]
fn test_profile_add_to_other_profile_skips_rebuild() {
    let volt = TestVolt::new();
    let repos = install_disabled(&volt, &["a/b"]);
    let rebuilder = RecordingRebuilder::default();

    let change = Registrar::new(&volt.paths, &rebuilder)
        .add_to_profile(Some("work"), &repos)
        .unwrap();

    assert_eq!(change.profile, "work");
    let lock = volt.lock();
    assert_eq!(find_profile(&lock, "work").unwrap().repos_path, repos);
    assert!(find_profile(&lock, "default").unwrap().repos_path.is_empty());
    // The rebuild only reflects the current profile
    assert_eq!(rebuilder.calls.get(), 0);
}

#[test]
fn test_profile_add_to_missing_profile() {
    let volt = TestVolt::new();
    let repos = install_disabled(&volt, &["a/b"]);
    let before = volt.lock_bytes();

    let rebuilder = RecordingRebuilder::default();
    let err = Registrar::new(&volt.paths, &rebuilder)
        .add_to_profile(Some("nope"), &repos)
        .unwrap_err();

    assert!(matches!(err, VoltError::ProfileNotFound { name } if name == "nope"));
    assert_eq!(volt.lock_bytes(), before);
}

#[test]
fn test_remove_orphans_keeps_registered_repos() {
    let volt = TestVolt::new();
    let repos = install_disabled(&volt, &["a/b"]);
    let orphan = normalize_repos("localhost/local/half").unwrap();
    common::write_plugin(&volt.paths.full_repos_path(&orphan), "half", false).unwrap();
    let lock_before = volt.lock_bytes();

    assert_eq!(find_orphans(&volt.paths, &volt.lock()).unwrap().len(), 1);

    let rebuilder = RecordingRebuilder::default();
    let removed = Registrar::new(&volt.paths, &rebuilder)
        .remove_orphans()
        .unwrap();

    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].repos_path, orphan);
    assert!(!volt.paths.full_repos_path(&orphan).exists());
    assert!(volt.paths.full_repos_path(&repos[0]).exists());
    assert_eq!(volt.lock_bytes(), lock_before);
    assert!(find_orphans(&volt.paths, &volt.lock()).unwrap().is_empty());
}
