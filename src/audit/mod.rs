//! Audit log: append-only record of security-relevant operations.
//!
//! Entries live in the `audit_log` table of the vault database.  They
//! name the project, environment, and key involved and whether the
//! operation succeeded, but never carry a secret value.
//!
//! Logging is fire-and-forget: a failed audit write is reported through
//! `tracing` and never fails the operation being audited.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::errors::Result;
use crate::store::{parse_time_column, Store};

/// What kind of operation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Read,
    Create,
    Update,
    Delete,
    Export,
    Run,
    Import,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Export => "export",
            Self::Run => "run",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub project: Option<String>,
    pub environment: Option<String>,
    pub key_name: Option<String>,
    pub success: bool,
    pub details: Option<String>,
}

/// Where an audited operation happened.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditScope<'a> {
    pub project: Option<&'a str>,
    pub environment: Option<&'a str>,
    pub key: Option<&'a str>,
}

/// Audit log view over the vault database.
pub struct AuditLog<'a> {
    store: &'a Store,
}

impl<'a> AuditLog<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Record an operation. Fire-and-forget: failures are only traced.
    pub fn log(&self, action: AuditAction, scope: AuditScope<'_>, success: bool, details: Option<&str>) {
        let result = self.store.conn().execute(
            "INSERT INTO audit_log (timestamp, action, project, environment, key_name, success, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Utc::now().to_rfc3339(),
                action.as_str(),
                scope.project,
                scope.environment,
                scope.key,
                success,
                details,
            ],
        );
        if let Err(e) = result {
            tracing::warn!(error = %e, action = %action, "failed to write audit entry");
        }
    }

    /// Most recent entries first, at most `limit`.
    pub fn query(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.store.conn().prepare(
            "SELECT id, timestamp, action, project, environment, key_name, success, details
             FROM audit_log
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                timestamp: parse_time_column(row, 1)?,
                action: row.get(2)?,
                project: row.get(3)?,
                environment: row.get(4)?,
                key_name: row.get(5)?,
                success: row.get(6)?,
                details: row.get(7)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
