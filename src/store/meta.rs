use rusqlite::{params, OptionalExtension};

use super::models::VaultMeta;
use super::{constraint_code, parse_time_column, Store};
use crate::crypto::Argon2Params;
use crate::errors::{CofferError, Result};

impl Store {
    // ------------------------------------------------------------------
    // Vault metadata
    // ------------------------------------------------------------------

    /// The singleton metadata row, or `None` before `init`.
    pub fn vault_meta(&self) -> Result<Option<VaultMeta>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT salt, key_check, key_check_nonce,
                        argon2_memory_kib, argon2_iterations, argon2_parallelism,
                        keychain_enabled, created_at
                 FROM vault_meta WHERE id = 1",
                [],
                |row| {
                    Ok(VaultMeta {
                        salt: row.get(0)?,
                        key_check: row.get(1)?,
                        key_check_nonce: row.get(2)?,
                        argon2: Argon2Params {
                            memory_kib: row.get(3)?,
                            iterations: row.get(4)?,
                            parallelism: row.get(5)?,
                        },
                        keychain_enabled: row.get(6)?,
                        created_at: parse_time_column(row, 7)?,
                    })
                },
            )
            .optional()?)
    }

    /// Write the metadata row.  Fails with `AlreadyInitialized` if one exists.
    pub fn create_vault_meta(&self, meta: &VaultMeta) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO vault_meta
                    (id, salt, key_check, key_check_nonce,
                     argon2_memory_kib, argon2_iterations, argon2_parallelism,
                     keychain_enabled, created_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    meta.salt,
                    meta.key_check,
                    meta.key_check_nonce,
                    meta.argon2.memory_kib,
                    meta.argon2.iterations,
                    meta.argon2.parallelism,
                    meta.keychain_enabled,
                    meta.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match constraint_code(&e) {
                Some(_) => CofferError::AlreadyInitialized,
                None => CofferError::Database(e),
            })?;
        Ok(())
    }

    pub fn set_keychain_enabled(&self, enabled: bool) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE vault_meta SET keychain_enabled = ?1 WHERE id = 1",
            [enabled],
        )?;
        if changed == 0 {
            return Err(CofferError::NotInitialized);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Config key/value
    // ------------------------------------------------------------------

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn()
            .query_row("SELECT value FROM config WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Upsert a config value; last write wins.
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        tracing::debug!(key, "config updated");
        Ok(())
    }

    pub fn delete_config(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM config WHERE key = ?1", [key])?;
        Ok(())
    }
}
