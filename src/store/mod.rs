//! Durable store: SQLite persistence for projects, environments,
//! versioned secrets, vault metadata, config, and the audit log.
//!
//! The store holds ciphertext only.  It never sees a key or a plaintext.

pub mod environments;
pub mod meta;
pub mod models;
pub mod projects;
pub mod secrets;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::errors::{CofferError, Result};

pub use models::{
    ChangeKind, Environment, EnvironmentId, MergedSecret, Project, ProjectId, Secret,
    SecretHistory, VaultMeta,
};
pub use secrets::validate_key_name;

/// Config key under which the active project name is kept.
pub const ACTIVE_PROJECT_KEY: &str = "active_project";

/// Maximum length of a project or environment name.
const MAX_NAME_LEN: usize = 64;

/// SQLite-backed store.  One connection per process.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.busy_timeout(busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::trace!(journal_mode = %mode, "journal mode set");

        // Set restrictive permissions on the database (owner-only).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        let store = Self::from_connection(conn)?;
        tracing::debug!(path = %path.display(), "opened vault database");
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run schema migrations to create tables.
    fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS vault_meta (
                id                  INTEGER PRIMARY KEY CHECK (id = 1),
                salt                BLOB NOT NULL,
                key_check           BLOB NOT NULL,
                key_check_nonce     BLOB NOT NULL,
                argon2_memory_kib   INTEGER NOT NULL,
                argon2_iterations   INTEGER NOT NULL,
                argon2_parallelism  INTEGER NOT NULL,
                keychain_enabled    INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS projects (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS environments (
                id          TEXT PRIMARY KEY,
                project_id  TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                parent_id   TEXT REFERENCES environments(id) ON DELETE RESTRICT,
                created_at  TEXT NOT NULL,
                UNIQUE (project_id, name)
            );

            CREATE TABLE IF NOT EXISTS secrets (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                environment_id  TEXT NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
                key             TEXT NOT NULL,
                ciphertext      BLOB NOT NULL,
                nonce           BLOB NOT NULL,
                version         INTEGER NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                UNIQUE (environment_id, key)
            );

            CREATE TABLE IF NOT EXISTS secret_history (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                environment_id  TEXT NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
                key             TEXT NOT NULL,
                ciphertext      BLOB NOT NULL,
                nonce           BLOB NOT NULL,
                version         INTEGER NOT NULL,
                change_kind     TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS config (
                key     TEXT PRIMARY KEY,
                value   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                action      TEXT NOT NULL,
                project     TEXT,
                environment TEXT,
                key_name    TEXT,
                success     INTEGER NOT NULL,
                details     TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_environments_parent
                ON environments(parent_id);

            CREATE INDEX IF NOT EXISTS idx_history_env_key
                ON secret_history(environment_id, key, version);
            ",
        )?;

        tracing::debug!("database migrations completed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared helpers for the store submodules
// ---------------------------------------------------------------------------

/// Validate a project or environment name.
///
/// Allowed: letters, digits, hyphens, underscores. Must not be empty
/// or start/end with a hyphen. Max length 64 characters.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CofferError::InvalidName(format!("{kind} name cannot be empty")));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(CofferError::InvalidName(format!(
            "{kind} name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CofferError::InvalidName(format!(
            "{kind} name '{name}' is invalid: only letters, digits, hyphens, and underscores are allowed"
        )));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(CofferError::InvalidName(format!(
            "{kind} name '{name}' cannot start or end with a hyphen"
        )));
    }

    Ok(())
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Read an RFC 3339 column into a UTC timestamp.
pub fn parse_time_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Extended SQLite result code of a constraint failure, if any.
pub(crate) fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

/// Translate uniqueness violations into `AlreadyExists(what)`.
pub(crate) fn map_unique(err: rusqlite::Error, what: impl FnOnce() -> String) -> CofferError {
    match constraint_code(&err) {
        Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
        | Some(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => CofferError::AlreadyExists(what()),
        _ => CofferError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_create_all_tables() {
        let store = Store::open_in_memory().unwrap();
        for table in [
            "vault_meta",
            "projects",
            "environments",
            "secrets",
            "secret_history",
            "config",
            "audit_log",
        ] {
            let count: i64 = store
                .conn()
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store.run_migrations().unwrap();
    }

    #[test]
    fn open_on_disk_enables_wal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = Store::open(&tmp.path().join("vault.db"), Duration::from_millis(100)).unwrap();
        let mode: String = store
            .conn()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        let fk: i64 = store
            .conn()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn valid_names() {
        assert!(validate_name("project", "myapp").is_ok());
        assert!(validate_name("environment", "us-east-1").is_ok());
        assert!(validate_name("environment", "feature_x").is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        assert!(validate_name("project", "").is_err());
        assert!(validate_name("project", "-dev").is_err());
        assert!(validate_name("project", "dev-").is_err());
        assert!(validate_name("project", "a b").is_err());
        assert!(validate_name("project", "a/b").is_err());
        assert!(validate_name("project", &"a".repeat(65)).is_err());
    }
}
