//! Secret engine: the composition root.
//!
//! Every operation fetches the session key first, decrypts only what it
//! was asked for, and leaves an audit entry (success or failure, never
//! a value).

use std::collections::BTreeMap;

use crate::audit::{AuditAction, AuditLog, AuditScope};
use crate::crypto::{self, EncryptionKey};
use crate::errors::{CofferError, Result};
use crate::resolver::{self, InheritanceResolver};
use crate::store::{
    validate_key_name, ChangeKind, Environment, MergedSecret, Project, SecretHistory, Store,
    ACTIVE_PROJECT_KEY,
};
use crate::vault::Vault;

/// A project and one of its environments.
#[derive(Debug, Clone)]
pub struct Target {
    pub project: Project,
    pub environment: Environment,
}

impl Target {
    fn scope<'a>(&'a self, key: Option<&'a str>) -> AuditScope<'a> {
        AuditScope {
            project: Some(&self.project.name),
            environment: Some(&self.environment.name),
            key,
        }
    }
}

/// A decrypted value and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    pub key: String,
    pub value: String,
    pub version: i64,
    pub source_env: String,
    pub inherited: bool,
}

/// What `set` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Created,
    Updated { version: i64 },
}

/// A history row, optionally with its value revealed.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub record: SecretHistory,
    /// `None` when not revealed, for deletions, or if decryption failed.
    pub value: Option<String>,
}

/// Counts from an `import`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    /// Keys that are not valid secret names.
    pub skipped: Vec<String>,
}

/// High-level secret operations over an unlocked vault.
pub struct SecretEngine<'a> {
    vault: &'a Vault,
}

impl<'a> SecretEngine<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    fn store(&self) -> &Store {
        self.vault.store()
    }

    fn audit(&self) -> AuditLog<'_> {
        AuditLog::new(self.store())
    }

    /// Run `op` and record the outcome under `action`.
    fn audited<T>(
        &self,
        action: AuditAction,
        scope: AuditScope<'_>,
        op: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let result = op();
        match &result {
            Ok(_) => self.audit().log(action, scope, true, None),
            Err(e) => self.audit().log(action, scope, false, Some(&e.to_string())),
        }
        result
    }

    // ------------------------------------------------------------------
    // Projects and targets
    // ------------------------------------------------------------------

    /// The project named by the `active_project` config entry.
    pub fn active_project(&self) -> Result<Project> {
        let name = self
            .store()
            .get_config(ACTIVE_PROJECT_KEY)?
            .ok_or(CofferError::NoActiveProject)?;
        self.store().get_project_by_name(&name).map_err(|e| match e {
            CofferError::NotFound(_) => CofferError::NoActiveProject,
            other => other,
        })
    }

    /// Make `name` the active project.
    pub fn use_project(&self, name: &str) -> Result<Project> {
        let project = self.store().get_project_by_name(name)?;
        self.store().set_config(ACTIVE_PROJECT_KEY, &project.name)?;
        tracing::info!(project = %project.name, "active project changed");
        Ok(project)
    }

    /// Environment `env_name` of the active project.
    pub fn target(&self, env_name: &str) -> Result<Target> {
        let project = self.active_project()?;
        let environment = self
            .store()
            .get_environment_by_name(&project.id, env_name)
            .map_err(|e| match e {
                CofferError::NotFound(_) => CofferError::NotFound(format!(
                    "environment '{env_name}' in project '{}'",
                    project.name
                )),
                other => other,
            })?;
        Ok(Target {
            project,
            environment,
        })
    }

    // ------------------------------------------------------------------
    // Single secrets
    // ------------------------------------------------------------------

    /// Decrypt the value `target` sees for `key`, following inheritance.
    pub fn get(&self, target: &Target, key: &str) -> Result<ResolvedSecret> {
        self.audited(AuditAction::Read, target.scope(Some(key)), || {
            let enc_key = self.vault.get_key()?;
            let merged = InheritanceResolver::new(self.store()).resolve_secret(&target.environment.id, key)?;
            let value = decrypt_merged(&enc_key, &merged)?;
            Ok(ResolvedSecret {
                key: key.to_string(),
                value,
                version: merged.secret.version,
                source_env: merged.source_env_name,
                inherited: merged.inherited,
            })
        })
    }

    /// Encrypt `value` and create or update `key` in `target`.
    pub fn set(&self, target: &Target, key: &str, value: &str) -> Result<SetOutcome> {
        let enc_key = match self.vault.get_key() {
            Ok(k) => k,
            Err(e) => {
                self.audit().log(AuditAction::Update, target.scope(Some(key)), false, Some(&e.to_string()));
                return Err(e);
            }
        };
        let env_id = &target.environment.id;
        let exists = self.store().find_secret(env_id, key)?.is_some();
        let action = if exists {
            AuditAction::Update
        } else {
            AuditAction::Create
        };

        self.audited(action, target.scope(Some(key)), || {
            validate_key_name(key)?;
            let (ciphertext, nonce) = crypto::encrypt(enc_key.as_bytes(), value.as_bytes(), key.as_bytes())?;
            if exists {
                let secret = self.store().update_secret(env_id, key, &ciphertext, &nonce)?;
                Ok(SetOutcome::Updated {
                    version: secret.version,
                })
            } else {
                self.store().create_secret(env_id, key, &ciphertext, &nonce)?;
                Ok(SetOutcome::Created)
            }
        })
    }

    /// Delete `key` from `target` itself.  Inherited keys are `NotFound`.
    pub fn delete(&self, target: &Target, key: &str) -> Result<()> {
        self.audited(AuditAction::Delete, target.scope(Some(key)), || {
            self.vault.get_key()?;
            self.store().delete_secret(&target.environment.id, key)
        })
    }

    // ------------------------------------------------------------------
    // Whole environments
    // ------------------------------------------------------------------

    /// Every key `target` sees, with its source.  Nothing is decrypted.
    pub fn list(&self, target: &Target) -> Result<Vec<MergedSecret>> {
        self.vault.get_key()?;
        InheritanceResolver::new(self.store()).resolve_all(&target.environment.id)
    }

    /// Decrypt every key `target` sees, unexpanded, audited as a read.
    pub fn reveal_environment(&self, target: &Target) -> Result<BTreeMap<String, String>> {
        self.audited(AuditAction::Read, target.scope(None), || {
            self.resolve_environment(target, false)
        })
    }

    /// Decrypt every key `target` sees, optionally expanding `${NAME}`
    /// references.  Callers record their own audit entry.
    fn resolve_environment(&self, target: &Target, expand_refs: bool) -> Result<BTreeMap<String, String>> {
        let enc_key = self.vault.get_key()?;
        let merged = InheritanceResolver::new(self.store()).resolve_all(&target.environment.id)?;

        let mut values = BTreeMap::new();
        for m in &merged {
            values.insert(m.secret.key.clone(), decrypt_merged(&enc_key, m)?);
        }

        if expand_refs {
            values = resolver::resolve(&values)?;
        }
        tracing::debug!(env = %target.environment.name, count = values.len(), expand_refs, "environment resolved");
        Ok(values)
    }

    /// `resolve_environment` audited as an export.
    pub fn export(&self, target: &Target, expand_refs: bool) -> Result<BTreeMap<String, String>> {
        self.audited(AuditAction::Export, target.scope(None), || {
            self.resolve_environment(target, expand_refs)
        })
    }

    /// The fully resolved mapping handed to a child process, audited as a run.
    pub fn run_environment(&self, target: &Target, command: &str) -> Result<BTreeMap<String, String>> {
        let result = self.resolve_environment(target, true);
        let details = match &result {
            Ok(_) => command.to_string(),
            Err(e) => format!("{command}: {e}"),
        };
        self.audit()
            .log(AuditAction::Run, target.scope(None), result.is_ok(), Some(&details));
        result
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// History of `key` in `target`, newest first.
    ///
    /// With `reveal`, non-delete rows are decrypted and the listing is
    /// audited as a read; a row that fails to decrypt gets `None` instead
    /// of aborting the listing.
    pub fn history(&self, target: &Target, key: &str, limit: usize, reveal: bool) -> Result<Vec<HistoryEntry>> {
        if reveal {
            self.audited(AuditAction::Read, target.scope(Some(key)), || {
                self.history_entries(target, key, limit, true)
            })
        } else {
            self.history_entries(target, key, limit, false)
        }
    }

    fn history_entries(&self, target: &Target, key: &str, limit: usize, reveal: bool) -> Result<Vec<HistoryEntry>> {
        let enc_key = self.vault.get_key()?;
        let rows = self.store().history(&target.environment.id, key, limit)?;

        Ok(rows
            .into_iter()
            .map(|record| {
                let value = if reveal && record.change != ChangeKind::Delete {
                    decrypt_value(&enc_key, &record.key, &record.ciphertext, &record.nonce).ok()
                } else {
                    None
                };
                HistoryEntry { record, value }
            })
            .collect())
    }

    /// Republish the ciphertext of `version` as the live value.
    ///
    /// Returns the new live version.
    pub fn restore(&self, target: &Target, key: &str, version: i64) -> Result<i64> {
        let env_id = &target.environment.id;
        let exists = self.store().find_secret(env_id, key)?.is_some();
        let action = if exists {
            AuditAction::Update
        } else {
            AuditAction::Create
        };

        self.audited(action, target.scope(Some(key)), || {
            self.vault.get_key()?;
            let record = self.store().version(env_id, key, version)?;
            if record.change == ChangeKind::Delete {
                return Err(CofferError::CannotRestoreDeletion(version));
            }

            let secret = if exists {
                self.store()
                    .update_secret(env_id, key, &record.ciphertext, &record.nonce)?
            } else {
                self.store()
                    .create_secret(env_id, key, &record.ciphertext, &record.nonce)?
            };
            tracing::info!(key, from_version = version, version = secret.version, "secret restored");
            Ok(secret.version)
        })
    }

    // ------------------------------------------------------------------
    // Bulk import
    // ------------------------------------------------------------------

    /// Set every entry whose key is a valid secret name; skip the rest.
    pub fn import(&self, target: &Target, entries: &[(String, String)]) -> Result<ImportReport> {
        self.audited(AuditAction::Import, target.scope(None), || {
            let enc_key = self.vault.get_key()?;
            let env_id = &target.environment.id;
            let mut report = ImportReport::default();

            for (key, value) in entries {
                if validate_key_name(key).is_err() {
                    tracing::debug!(key = %key, "skipping invalid key on import");
                    report.skipped.push(key.clone());
                    continue;
                }

                let (ciphertext, nonce) = crypto::encrypt(enc_key.as_bytes(), value.as_bytes(), key.as_bytes())?;
                if self.store().find_secret(env_id, key)?.is_some() {
                    self.store().update_secret(env_id, key, &ciphertext, &nonce)?;
                    report.updated += 1;
                } else {
                    self.store().create_secret(env_id, key, &ciphertext, &nonce)?;
                    report.created += 1;
                }
            }

            Ok(report)
        })
    }
}

fn decrypt_merged(key: &EncryptionKey, merged: &MergedSecret) -> Result<String> {
    decrypt_value(key, &merged.secret.key, &merged.secret.ciphertext, &merged.secret.nonce)
}

/// Decrypt a stored value with its key name as associated data.
fn decrypt_value(key: &EncryptionKey, name: &str, ciphertext: &[u8], nonce: &[u8]) -> Result<String> {
    let plaintext = crypto::decrypt(key.as_bytes(), ciphertext, nonce, name.as_bytes())?;
    String::from_utf8(plaintext)
        .map_err(|_| CofferError::Serialization(format!("secret '{name}' is not valid UTF-8")))
}
