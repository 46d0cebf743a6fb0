//! Integration tests for the durable store: versioning, history, and
//! cascading deletes.

use coffer::errors::CofferError;
use coffer::store::{ChangeKind, Environment, Store};

fn store_with_env() -> (Store, Environment) {
    let store = Store::open_in_memory().expect("open store");
    let project = store.create_project("api", None).unwrap();
    let env = store.create_environment(&project.id, "dev", None).unwrap();
    (store, env)
}

#[test]
fn versions_increase_by_one_per_update() {
    let (store, env) = store_with_env();
    let n = 4;

    store.create_secret(&env.id, "TOKEN", b"ct0", &[0u8; 12]).unwrap();
    for i in 1..=n {
        let ct = format!("ct{i}");
        store
            .update_secret(&env.id, "TOKEN", ct.as_bytes(), &[0u8; 12])
            .unwrap();
    }

    let live = store.get_secret(&env.id, "TOKEN").unwrap();
    assert_eq!(live.version, n + 1);
    assert_eq!(live.ciphertext, format!("ct{n}").into_bytes());

    let history = store.history(&env.id, "TOKEN", 100).unwrap();
    let versions: Vec<i64> = history.iter().map(|h| h.version).collect();
    assert_eq!(versions, (1..=n + 1).rev().collect::<Vec<_>>());
    assert_eq!(history.last().unwrap().change, ChangeKind::Create);
    assert!(history[..history.len() - 1]
        .iter()
        .all(|h| h.change == ChangeKind::Update));

    store.delete_secret(&env.id, "TOKEN").unwrap();
    assert!(store.find_secret(&env.id, "TOKEN").unwrap().is_none());

    let history = store.history(&env.id, "TOKEN", 100).unwrap();
    assert_eq!(history.len() as i64, n + 2);
    assert_eq!(history[0].version, n + 2);
    assert_eq!(history[0].change, ChangeKind::Delete);
    // The delete row keeps the last live ciphertext.
    assert_eq!(history[0].ciphertext, format!("ct{n}").into_bytes());
}

#[test]
fn history_limit_keeps_newest() {
    let (store, env) = store_with_env();
    store.create_secret(&env.id, "K", b"a", &[0u8; 12]).unwrap();
    store.update_secret(&env.id, "K", b"b", &[0u8; 12]).unwrap();
    store.update_secret(&env.id, "K", b"c", &[0u8; 12]).unwrap();

    let history = store.history(&env.id, "K", 2).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].version, 3);
    assert_eq!(history[1].version, 2);
}

#[test]
fn recreated_key_restarts_at_version_one() {
    let (store, env) = store_with_env();
    store.create_secret(&env.id, "K", b"first", &[0u8; 12]).unwrap();
    store.delete_secret(&env.id, "K").unwrap();
    let again = store.create_secret(&env.id, "K", b"second", &[0u8; 12]).unwrap();
    assert_eq!(again.version, 1);

    // Both lineages share version 1; the newest row wins.
    let v1 = store.version(&env.id, "K", 1).unwrap();
    assert_eq!(v1.ciphertext, b"second");

    let history = store.history(&env.id, "K", 10).unwrap();
    assert_eq!(history[0].change, ChangeKind::Delete);
    assert_eq!(history[1].ciphertext, b"second");
    assert_eq!(history[2].ciphertext, b"first");
}

#[test]
fn failed_history_write_leaves_the_live_row_untouched() {
    let (store, env) = store_with_env();
    store.create_secret(&env.id, "K", b"live", &[0u8; 12]).unwrap();

    store
        .conn()
        .execute_batch(
            "CREATE TRIGGER refuse_history BEFORE INSERT ON secret_history
             BEGIN SELECT RAISE(ABORT, 'history unavailable'); END;",
        )
        .unwrap();

    assert!(store.update_secret(&env.id, "K", b"next", &[1u8; 12]).is_err());
    assert!(store.create_secret(&env.id, "J", b"new", &[0u8; 12]).is_err());
    assert!(store.delete_secret(&env.id, "K").is_err());

    let live = store.get_secret(&env.id, "K").unwrap();
    assert_eq!(live.version, 1);
    assert_eq!(live.ciphertext, b"live");
    assert!(store.find_secret(&env.id, "J").unwrap().is_none());
    assert_eq!(store.history(&env.id, "K", 10).unwrap().len(), 1);
    assert!(store.history(&env.id, "J", 10).unwrap().is_empty());
}

#[test]
fn failed_delete_leaves_no_history_row() {
    let (store, env) = store_with_env();
    store.create_secret(&env.id, "K", b"live", &[0u8; 12]).unwrap();

    store
        .conn()
        .execute_batch(
            "CREATE TRIGGER refuse_delete BEFORE DELETE ON secrets
             BEGIN SELECT RAISE(ABORT, 'delete refused'); END;",
        )
        .unwrap();

    assert!(store.delete_secret(&env.id, "K").is_err());

    assert_eq!(store.get_secret(&env.id, "K").unwrap().version, 1);
    let history = store.history(&env.id, "K", 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].change, ChangeKind::Create);
}

#[test]
fn mutations_of_missing_keys_fail() {
    let (store, env) = store_with_env();
    assert!(matches!(
        store.update_secret(&env.id, "NOPE", b"x", &[0u8; 12]),
        Err(CofferError::NotFound(_))
    ));
    assert!(matches!(
        store.delete_secret(&env.id, "NOPE"),
        Err(CofferError::NotFound(_))
    ));
    assert!(matches!(
        store.version(&env.id, "NOPE", 1),
        Err(CofferError::NotFound(_))
    ));
}

#[test]
fn uniqueness_is_enforced() {
    let (store, env) = store_with_env();
    assert!(matches!(
        store.create_project("api", None),
        Err(CofferError::AlreadyExists(_))
    ));
    assert!(matches!(
        store.create_environment(&env.project_id, "dev", None),
        Err(CofferError::AlreadyExists(_))
    ));
    store.create_secret(&env.id, "K", b"x", &[0u8; 12]).unwrap();
    assert!(matches!(
        store.create_secret(&env.id, "K", b"y", &[0u8; 12]),
        Err(CofferError::AlreadyExists(_))
    ));
}

#[test]
fn parent_with_children_cannot_be_deleted() {
    let (store, root) = store_with_env();
    let child = store
        .create_environment(&root.project_id, "staging", Some(&root.id))
        .unwrap();

    assert!(matches!(
        store.delete_environment(&root.id),
        Err(CofferError::HasChildren { .. })
    ));

    store.delete_environment(&child.id).unwrap();
    store.delete_environment(&root.id).unwrap();
}

#[test]
fn deleting_a_project_cascades() {
    let (store, root) = store_with_env();
    let child = store
        .create_environment(&root.project_id, "staging", Some(&root.id))
        .unwrap();
    store.create_secret(&root.id, "A", b"x", &[0u8; 12]).unwrap();
    store.create_secret(&child.id, "B", b"y", &[0u8; 12]).unwrap();

    store.delete_project(&root.project_id).unwrap();

    assert!(store.list_projects().unwrap().is_empty());
    assert!(store.find_environment(&root.id).unwrap().is_none());
    assert!(store.find_environment(&child.id).unwrap().is_none());
    assert!(store.history(&root.id, "A", 10).unwrap().is_empty());
    assert!(store.history(&child.id, "B", 10).unwrap().is_empty());
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("vault.db");
    let timeout = std::time::Duration::from_millis(500);

    {
        let store = Store::open(&path, timeout).unwrap();
        store.create_project("persisted", Some("kept on disk")).unwrap();
    }

    let store = Store::open(&path, timeout).unwrap();
    let project = store.get_project_by_name("persisted").unwrap();
    assert_eq!(project.description.as_deref(), Some("kept on disk"));
}
