//! Versioned secret rows and their append-only history.
//!
//! Every mutation writes the live row and its history row inside one
//! transaction.  History rows are never updated or deleted except by the
//! cascade that removes their environment.

use rusqlite::{params, OptionalExtension, Transaction};

use super::models::{ChangeKind, EnvironmentId, Secret, SecretHistory};
use super::{map_unique, now, parse_time_column, Store};
use crate::errors::{CofferError, Result};

const SECRET_COLUMNS: &str =
    "id, environment_id, key, ciphertext, nonce, version, created_at, updated_at";

const HISTORY_COLUMNS: &str =
    "id, environment_id, key, ciphertext, nonce, version, change_kind, created_at";

fn row_to_secret(row: &rusqlite::Row<'_>) -> rusqlite::Result<Secret> {
    Ok(Secret {
        id: row.get(0)?,
        environment_id: row.get(1)?,
        key: row.get(2)?,
        ciphertext: row.get(3)?,
        nonce: row.get(4)?,
        version: row.get(5)?,
        created_at: parse_time_column(row, 6)?,
        updated_at: parse_time_column(row, 7)?,
    })
}

fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<SecretHistory> {
    Ok(SecretHistory {
        id: row.get(0)?,
        environment_id: row.get(1)?,
        key: row.get(2)?,
        ciphertext: row.get(3)?,
        nonce: row.get(4)?,
        version: row.get(5)?,
        change: row.get(6)?,
        created_at: parse_time_column(row, 7)?,
    })
}

/// Check that a key looks like an environment variable name:
/// an uppercase letter, then uppercase letters, digits, or underscores.
pub fn validate_key_name(key: &str) -> Result<()> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {
            chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(CofferError::InvalidName(format!(
            "secret key '{key}' must start with an uppercase letter and contain only A-Z, 0-9, and _"
        )))
    }
}

#[allow(clippy::too_many_arguments)]
fn append_history(
    tx: &Transaction<'_>,
    env: &EnvironmentId,
    key: &str,
    ciphertext: &[u8],
    nonce: &[u8],
    version: i64,
    change: ChangeKind,
    at: &str,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO secret_history
            (environment_id, key, ciphertext, nonce, version, change_kind, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![env, key, ciphertext, nonce, version, change, at],
    )?;
    Ok(())
}

fn live_version(tx: &Transaction<'_>, env: &EnvironmentId, key: &str) -> Result<i64> {
    tx.query_row(
        "SELECT version FROM secrets WHERE environment_id = ?1 AND key = ?2",
        params![env, key],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| CofferError::NotFound(format!("secret '{key}'")))
}

impl Store {
    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Insert a new secret at version 1 with a `create` history row.
    pub fn create_secret(
        &self,
        env: &EnvironmentId,
        key: &str,
        ciphertext: &[u8],
        nonce: &[u8],
    ) -> Result<Secret> {
        validate_key_name(key)?;

        let at = now();
        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO secrets (environment_id, key, ciphertext, nonce, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
            params![env, key, ciphertext, nonce, at],
        )
        .map_err(|e| map_unique(e, || format!("secret '{key}'")))?;
        append_history(&tx, env, key, ciphertext, nonce, 1, ChangeKind::Create, &at)?;
        tx.commit()?;

        tracing::info!(env_id = %env, key, version = 1, "secret created");
        self.get_secret(env, key)
    }

    /// Replace the live value, bumping the version, with an `update` history row.
    pub fn update_secret(
        &self,
        env: &EnvironmentId,
        key: &str,
        ciphertext: &[u8],
        nonce: &[u8],
    ) -> Result<Secret> {
        let at = now();
        let tx = self.conn().unchecked_transaction()?;
        let version = live_version(&tx, env, key)? + 1;

        tx.execute(
            "UPDATE secrets SET ciphertext = ?1, nonce = ?2, version = ?3, updated_at = ?4
             WHERE environment_id = ?5 AND key = ?6",
            params![ciphertext, nonce, version, at, env, key],
        )?;
        append_history(&tx, env, key, ciphertext, nonce, version, ChangeKind::Update, &at)?;
        tx.commit()?;

        tracing::info!(env_id = %env, key, version, "secret updated");
        self.get_secret(env, key)
    }

    /// Remove the live row, recording a `delete` history row at
    /// version + 1 that carries the last live ciphertext.
    pub fn delete_secret(&self, env: &EnvironmentId, key: &str) -> Result<()> {
        let at = now();
        let tx = self.conn().unchecked_transaction()?;

        let (ciphertext, nonce, version): (Vec<u8>, Vec<u8>, i64) = tx
            .query_row(
                "SELECT ciphertext, nonce, version FROM secrets WHERE environment_id = ?1 AND key = ?2",
                params![env, key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or_else(|| CofferError::NotFound(format!("secret '{key}'")))?;

        append_history(
            &tx,
            env,
            key,
            &ciphertext,
            &nonce,
            version + 1,
            ChangeKind::Delete,
            &at,
        )?;
        tx.execute(
            "DELETE FROM secrets WHERE environment_id = ?1 AND key = ?2",
            params![env, key],
        )?;
        tx.commit()?;

        tracing::info!(env_id = %env, key, version = version + 1, "secret deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_secret(&self, env: &EnvironmentId, key: &str) -> Result<Secret> {
        self.find_secret(env, key)?
            .ok_or_else(|| CofferError::NotFound(format!("secret '{key}'")))
    }

    /// Like `get_secret`, but a missing row is `None`.
    pub fn find_secret(&self, env: &EnvironmentId, key: &str) -> Result<Option<Secret>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {SECRET_COLUMNS} FROM secrets WHERE environment_id = ?1 AND key = ?2"),
                params![env, key],
                row_to_secret,
            )
            .optional()?)
    }

    /// Live secrets defined directly in `env`, ordered by key.
    pub fn list_secrets(&self, env: &EnvironmentId) -> Result<Vec<Secret>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SECRET_COLUMNS} FROM secrets WHERE environment_id = ?1 ORDER BY key"
        ))?;
        let rows = stmt.query_map([env], row_to_secret)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// History rows for a key, newest version first, at most `limit`.
    ///
    /// A key that was deleted and recreated reuses version numbers; equal
    /// versions are ordered newest row first.
    pub fn history(&self, env: &EnvironmentId, key: &str, limit: usize) -> Result<Vec<SecretHistory>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM secret_history
             WHERE environment_id = ?1 AND key = ?2
             ORDER BY version DESC, id DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![env, key, limit], row_to_history)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The history row for an exact version (the newest one if a
    /// recreated key has reused the number).
    pub fn version(&self, env: &EnvironmentId, key: &str, version: i64) -> Result<SecretHistory> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {HISTORY_COLUMNS} FROM secret_history
                     WHERE environment_id = ?1 AND key = ?2 AND version = ?3
                     ORDER BY id DESC LIMIT 1"
                ),
                params![env, key, version],
                row_to_history,
            )
            .optional()?
            .ok_or_else(|| CofferError::NotFound(format!("version {version} of secret '{key}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Store, EnvironmentId) {
        let store = Store::open_in_memory().unwrap();
        let p = store.create_project("myapp", None).unwrap();
        let env = store.create_environment(&p.id, "dev", None).unwrap();
        (store, env.id)
    }

    #[test]
    fn valid_key_names() {
        for key in ["A", "API_KEY", "DB_URL_2", "X9"] {
            assert!(validate_key_name(key).is_ok(), "{key} should be valid");
        }
    }

    #[test]
    fn invalid_key_names() {
        for key in ["", "api_key", "1KEY", "_KEY", "API-KEY", "API KEY", "Key"] {
            assert!(validate_key_name(key).is_err(), "{key} should be invalid");
        }
    }

    #[test]
    fn create_starts_at_version_one() {
        let (store, env) = setup();
        let s = store.create_secret(&env, "TOKEN", b"ct1", b"n1").unwrap();
        assert_eq!(s.version, 1);

        let h = store.history(&env, "TOKEN", 10).unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].change, ChangeKind::Create);
        assert_eq!(h[0].ciphertext, b"ct1");
    }

    #[test]
    fn create_conflicts_on_existing_key() {
        let (store, env) = setup();
        store.create_secret(&env, "TOKEN", b"ct1", b"n1").unwrap();
        assert!(matches!(
            store.create_secret(&env, "TOKEN", b"ct2", b"n2"),
            Err(CofferError::AlreadyExists(_))
        ));
        // The failed create left no history behind.
        assert_eq!(store.history(&env, "TOKEN", 10).unwrap().len(), 1);
    }

    #[test]
    fn create_rejects_invalid_key() {
        let (store, env) = setup();
        assert!(matches!(
            store.create_secret(&env, "lower", b"ct", b"n"),
            Err(CofferError::InvalidName(_))
        ));
    }

    #[test]
    fn update_and_delete_require_live_row() {
        let (store, env) = setup();
        assert!(matches!(
            store.update_secret(&env, "MISSING", b"ct", b"n"),
            Err(CofferError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_secret(&env, "MISSING"),
            Err(CofferError::NotFound(_))
        ));
        assert!(store.history(&env, "MISSING", 10).unwrap().is_empty());
    }

    #[test]
    fn delete_records_last_ciphertext_at_next_version() {
        let (store, env) = setup();
        store.create_secret(&env, "TOKEN", b"ct1", b"n1").unwrap();
        store.update_secret(&env, "TOKEN", b"ct2", b"n2").unwrap();
        store.delete_secret(&env, "TOKEN").unwrap();

        assert!(store.find_secret(&env, "TOKEN").unwrap().is_none());
        let deleted = store.version(&env, "TOKEN", 3).unwrap();
        assert_eq!(deleted.change, ChangeKind::Delete);
        assert_eq!(deleted.ciphertext, b"ct2");
        assert_eq!(deleted.nonce, b"n2");
    }

    #[test]
    fn recreate_after_delete_restarts_lineage() {
        let (store, env) = setup();
        store.create_secret(&env, "TOKEN", b"old", b"n1").unwrap();
        store.delete_secret(&env, "TOKEN").unwrap();
        let again = store.create_secret(&env, "TOKEN", b"new", b"n3").unwrap();
        assert_eq!(again.version, 1);

        let h = store.history(&env, "TOKEN", 10).unwrap();
        let seen: Vec<_> = h.iter().map(|r| (r.version, r.change)).collect();
        assert_eq!(
            seen,
            vec![
                (2, ChangeKind::Delete),
                (1, ChangeKind::Create),
                (1, ChangeKind::Create),
            ]
        );
        // The newer version-1 row sorts first and wins exact lookups.
        assert_eq!(h[1].ciphertext, b"new");
        assert_eq!(store.version(&env, "TOKEN", 1).unwrap().ciphertext, b"new");
    }

    #[test]
    fn history_respects_limit() {
        let (store, env) = setup();
        store.create_secret(&env, "TOKEN", b"v1", b"n").unwrap();
        for i in 2..=5 {
            store
                .update_secret(&env, "TOKEN", format!("v{i}").as_bytes(), b"n")
                .unwrap();
        }
        let h = store.history(&env, "TOKEN", 2).unwrap();
        assert_eq!(h.iter().map(|r| r.version).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[test]
    fn missing_version_is_not_found() {
        let (store, env) = setup();
        store.create_secret(&env, "TOKEN", b"v1", b"n").unwrap();
        assert!(matches!(
            store.version(&env, "TOKEN", 7),
            Err(CofferError::NotFound(_))
        ));
    }

    #[test]
    fn list_is_sorted_by_key() {
        let (store, env) = setup();
        store.create_secret(&env, "ZED", b"z", b"n").unwrap();
        store.create_secret(&env, "ALPHA", b"a", b"n").unwrap();
        let keys: Vec<_> = store
            .list_secrets(&env)
            .unwrap()
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert_eq!(keys, vec!["ALPHA", "ZED"]);
    }
}
