//! Integration tests for the secret engine over an in-memory vault.

use coffer::audit::{AuditEntry, AuditLog};
use coffer::crypto::Argon2Params;
use coffer::engine::{SecretEngine, SetOutcome, Target};
use coffer::errors::CofferError;
use coffer::keyring::MemoryKeychain;
use coffer::store::{ChangeKind, Store};
use coffer::vault::{MemorySessionStore, Vault};

const FAST: Argon2Params = Argon2Params {
    memory_kib: 8_192,
    iterations: 1,
    parallelism: 1,
};

/// An unlocked vault with project `shop` holding `base` and its child `dev`.
fn setup() -> Vault {
    let vault = Vault::new(
        Store::open_in_memory().unwrap(),
        Box::new(MemorySessionStore::new()),
        Box::new(MemoryKeychain::new()),
        FAST,
    );
    vault.initialize("engine-password").unwrap();

    let store = vault.store();
    let project = store.create_project("shop", None).unwrap();
    let base = store.create_environment(&project.id, "base", None).unwrap();
    store
        .create_environment(&project.id, "dev", Some(&base.id))
        .unwrap();
    SecretEngine::new(&vault).use_project("shop").unwrap();
    vault
}

fn targets(engine: &SecretEngine<'_>) -> (Target, Target) {
    (engine.target("base").unwrap(), engine.target("dev").unwrap())
}

fn audit_entries(vault: &Vault) -> Vec<AuditEntry> {
    AuditLog::new(vault.store()).query(1_000).unwrap()
}

#[test]
fn inherited_values_decrypt_in_the_child() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, dev) = targets(&engine);

    engine.set(&base, "LOG_LEVEL", "info").unwrap();
    engine.set(&base, "API_KEY", "base-key").unwrap();
    engine.set(&dev, "API_KEY", "dev-key").unwrap();

    let log = engine.get(&dev, "LOG_LEVEL").unwrap();
    assert_eq!(log.value, "info");
    assert!(log.inherited);
    assert_eq!(log.source_env, "base");

    let api = engine.get(&dev, "API_KEY").unwrap();
    assert_eq!(api.value, "dev-key");
    assert!(!api.inherited);

    // The parent still sees its own value.
    assert_eq!(engine.get(&base, "API_KEY").unwrap().value, "base-key");
}

#[test]
fn set_reports_versions() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, _) = targets(&engine);

    assert_eq!(engine.set(&base, "TOKEN", "a").unwrap(), SetOutcome::Created);
    assert_eq!(
        engine.set(&base, "TOKEN", "b").unwrap(),
        SetOutcome::Updated { version: 2 }
    );
    assert_eq!(engine.get(&base, "TOKEN").unwrap().version, 2);
}

#[test]
fn inherited_keys_cannot_be_deleted_from_the_child() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, dev) = targets(&engine);

    engine.set(&base, "SHARED", "x").unwrap();
    assert!(matches!(
        engine.delete(&dev, "SHARED"),
        Err(CofferError::NotFound(_))
    ));

    engine.delete(&base, "SHARED").unwrap();
    assert!(matches!(
        engine.get(&dev, "SHARED"),
        Err(CofferError::NotFound(_))
    ));
}

#[test]
fn resolve_environment_expands_only_on_request() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, dev) = targets(&engine);

    engine.set(&base, "HOST", "db.internal").unwrap();
    engine.set(&dev, "URL", "postgres://${HOST}/app").unwrap();

    let raw = engine.reveal_environment(&dev).unwrap();
    assert_eq!(raw["URL"], "postgres://${HOST}/app");

    let expanded = engine.export(&dev, true).unwrap();
    assert_eq!(expanded["URL"], "postgres://db.internal/app");
    assert_eq!(expanded.len(), 2);

    let for_child = engine.run_environment(&dev, "env").unwrap();
    assert_eq!(for_child, expanded);
}

#[test]
fn broken_references_fail_the_run() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (_, dev) = targets(&engine);

    engine.set(&dev, "A", "${MISSING}").unwrap();
    assert!(matches!(
        engine.run_environment(&dev, "true"),
        Err(CofferError::UnresolvedReference { .. })
    ));
    // Without expansion the raw value is still exportable.
    assert_eq!(engine.export(&dev, false).unwrap()["A"], "${MISSING}");
}

#[test]
fn list_is_metadata_only() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, dev) = targets(&engine);

    engine.set(&base, "A", "1").unwrap();
    engine.set(&dev, "B", "2").unwrap();

    let listed = engine.list(&dev).unwrap();
    let keys: Vec<(&str, bool)> = listed
        .iter()
        .map(|m| (m.secret.key.as_str(), m.inherited))
        .collect();
    assert_eq!(keys, vec![("A", true), ("B", false)]);
}

#[test]
fn history_and_restore() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, _) = targets(&engine);

    engine.set(&base, "PASSWORD", "first").unwrap();
    engine.set(&base, "PASSWORD", "second").unwrap();
    engine.set(&base, "PASSWORD", "third").unwrap();

    let history = engine.history(&base, "PASSWORD", 10, true).unwrap();
    let values: Vec<Option<&str>> = history.iter().map(|h| h.value.as_deref()).collect();
    assert_eq!(values, vec![Some("third"), Some("second"), Some("first")]);

    let hidden = engine.history(&base, "PASSWORD", 10, false).unwrap();
    assert!(hidden.iter().all(|h| h.value.is_none()));

    let new_version = engine.restore(&base, "PASSWORD", 1).unwrap();
    assert_eq!(new_version, 4);
    assert_eq!(engine.get(&base, "PASSWORD").unwrap().value, "first");
}

#[test]
fn restore_after_delete_recreates_the_key() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, _) = targets(&engine);

    engine.set(&base, "OLD", "keep-me").unwrap();
    engine.delete(&base, "OLD").unwrap();

    let history = engine.history(&base, "OLD", 10, true).unwrap();
    assert_eq!(history[0].record.change, ChangeKind::Delete);
    assert_eq!(history[0].value, None);

    assert!(matches!(
        engine.restore(&base, "OLD", 2),
        Err(CofferError::CannotRestoreDeletion(2))
    ));

    assert_eq!(engine.restore(&base, "OLD", 1).unwrap(), 1);
    assert_eq!(engine.get(&base, "OLD").unwrap().value, "keep-me");
}

#[test]
fn import_skips_invalid_keys() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, _) = targets(&engine);

    engine.set(&base, "EXISTING", "old").unwrap();
    let entries = vec![
        ("EXISTING".to_string(), "new".to_string()),
        ("FRESH".to_string(), "value".to_string()),
        ("lowercase".to_string(), "nope".to_string()),
    ];

    let report = engine.import(&base, &entries).unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, vec!["lowercase".to_string()]);
    assert_eq!(engine.get(&base, "EXISTING").unwrap().value, "new");
}

#[test]
fn unknown_environment_and_project_switching() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);

    assert!(matches!(
        engine.target("prod"),
        Err(CofferError::NotFound(_))
    ));

    vault.store().create_project("other", None).unwrap();
    engine.use_project("other").unwrap();
    assert_eq!(engine.active_project().unwrap().name, "other");
    assert!(matches!(
        engine.target("dev"),
        Err(CofferError::NotFound(_))
    ));

    assert!(matches!(
        engine.use_project("missing"),
        Err(CofferError::NotFound(_))
    ));
}

#[test]
fn ciphertexts_are_bound_to_their_key_name() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, _) = targets(&engine);

    engine.set(&base, "ONE", "first").unwrap();
    engine.set(&base, "TWO", "second").unwrap();

    // Move ONE's ciphertext under TWO's name.
    let one = vault.store().get_secret(&base.environment.id, "ONE").unwrap();
    vault
        .store()
        .conn()
        .execute(
            "UPDATE secrets SET ciphertext = ?1, nonce = ?2 WHERE key = 'TWO'",
            rusqlite::params![one.ciphertext, one.nonce],
        )
        .unwrap();

    assert!(matches!(
        engine.get(&base, "TWO"),
        Err(CofferError::InvalidCredential)
    ));
}

#[test]
fn revealing_values_is_audited_as_a_read() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, dev) = targets(&engine);
    engine.set(&base, "API_KEY", "s3cret").unwrap();

    let before = audit_entries(&vault).len();
    let history = engine.history(&base, "API_KEY", 10, true).unwrap();
    assert_eq!(history[0].value.as_deref(), Some("s3cret"));

    let entries = audit_entries(&vault);
    assert_eq!(entries.len(), before + 1);
    assert_eq!(entries[0].action, "read");
    assert_eq!(entries[0].key_name.as_deref(), Some("API_KEY"));

    let values = engine.reveal_environment(&dev).unwrap();
    assert_eq!(values["API_KEY"], "s3cret");

    let entries = audit_entries(&vault);
    assert_eq!(entries.len(), before + 2);
    assert_eq!(entries[0].action, "read");
    assert_eq!(entries[0].environment.as_deref(), Some("dev"));
    assert!(entries
        .iter()
        .all(|e| e.details.as_deref().map_or(true, |d| !d.contains("s3cret"))));
}

#[test]
fn hidden_history_writes_no_audit_entry() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, _) = targets(&engine);
    engine.set(&base, "API_KEY", "s3cret").unwrap();

    let before = audit_entries(&vault).len();
    engine.history(&base, "API_KEY", 10, false).unwrap();
    assert_eq!(audit_entries(&vault).len(), before);
}

#[test]
fn restore_is_audited_by_the_branch_taken() {
    let vault = setup();
    let engine = SecretEngine::new(&vault);
    let (base, _) = targets(&engine);

    engine.set(&base, "TOKEN", "one").unwrap();
    engine.set(&base, "TOKEN", "two").unwrap();
    engine.restore(&base, "TOKEN", 1).unwrap();
    assert_eq!(audit_entries(&vault)[0].action, "update");

    engine.delete(&base, "TOKEN").unwrap();
    engine.restore(&base, "TOKEN", 2).unwrap();
    let latest = &audit_entries(&vault)[0];
    assert_eq!(latest.action, "create");
    assert!(latest.success);
    assert_eq!(engine.get(&base, "TOKEN").unwrap().value, "two");
}
