//! Row types for the durable store.
//!
//! Ids are opaque UUIDv4 strings wrapped in newtypes so a project id can
//! never be passed where an environment id is expected.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use uuid::Uuid;

use crate::crypto::Argon2Params;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                String::column_result(value).map(Self)
            }
        }
    };
}

define_id!(
    /// Identity of a project.
    ProjectId
);

define_id!(
    /// Identity of an environment.
    EnvironmentId
);

/// A named collection of environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An environment within a project, optionally inheriting from a parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub id: EnvironmentId,
    pub project_id: ProjectId,
    pub name: String,
    pub parent_id: Option<EnvironmentId>,
    pub created_at: DateTime<Utc>,
}

/// The live, encrypted value of one key in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub id: i64,
    pub environment_id: EnvironmentId,
    pub key: String,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a history row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for ChangeKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ChangeKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(rusqlite::types::FromSqlError::Other(
                format!("unknown change kind '{other}'").into(),
            )),
        }
    }
}

/// One append-only ledger row: the ciphertext as it stood after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretHistory {
    pub id: i64,
    pub environment_id: EnvironmentId,
    pub key: String,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub version: i64,
    pub change: ChangeKind,
    pub created_at: DateTime<Utc>,
}

/// A secret seen through the inheritance chain of the queried environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSecret {
    pub secret: Secret,
    /// Environment that actually defines the key.
    pub source_env_id: EnvironmentId,
    pub source_env_name: String,
    /// `true` when the definer differs from the queried environment.
    pub inherited: bool,
}

/// Singleton row describing how the vault key is derived and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultMeta {
    pub salt: Vec<u8>,
    pub key_check: Vec<u8>,
    pub key_check_nonce: Vec<u8>,
    pub argon2: Argon2Params,
    pub keychain_enabled: bool,
    pub created_at: DateTime<Utc>,
}
