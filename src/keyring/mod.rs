//! Keychain collaborator for caching the vault key.
//!
//! The vault treats the keychain as an opaque blob store addressed by a
//! service/account pair.  "No entry" is a normal outcome; any other
//! failure means the keychain is unavailable.
//!
//! Implementations:
//! - `OsKeychain` (feature `keyring-store`): macOS Keychain, Windows
//!   Credential Manager, Linux Secret Service
//! - `MemoryKeychain`: process-local, for tests and embedding
//! - `NoKeychain`: always unavailable

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::errors::{CofferError, Result};

/// Service name used in the OS keychain.
pub const SERVICE_NAME: &str = "coffer";

/// Account name under which the vault key is stored.
pub const ACCOUNT_NAME: &str = "master-key";

/// Opaque secret-blob store.
pub trait Keychain {
    /// Store `blob`, replacing any existing entry.
    fn store(&self, service: &str, account: &str, blob: &str) -> Result<()>;

    /// Fetch the entry, or `None` if there is none.
    fn fetch(&self, service: &str, account: &str) -> Result<Option<String>>;

    /// Remove the entry.  Returns whether one existed.
    fn delete(&self, service: &str, account: &str) -> Result<bool>;

    /// Whether the keychain can be reached at all.
    fn is_available(&self) -> bool {
        self.fetch(SERVICE_NAME, ACCOUNT_NAME).is_ok()
    }
}

/// The keychain the binary uses: the OS one when compiled in.
pub fn default_keychain() -> Box<dyn Keychain> {
    #[cfg(feature = "keyring-store")]
    {
        Box::new(OsKeychain)
    }
    #[cfg(not(feature = "keyring-store"))]
    {
        Box::new(NoKeychain)
    }
}

// ---------------------------------------------------------------------------
// OS keychain
// ---------------------------------------------------------------------------

#[cfg(feature = "keyring-store")]
pub use os::OsKeychain;

#[cfg(feature = "keyring-store")]
mod os {
    use super::Keychain;
    use crate::errors::{CofferError, Result};

    /// Keychain backed by the operating system's credential store.
    pub struct OsKeychain;

    fn entry(service: &str, account: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(service, account).map_err(|e| {
            CofferError::KeychainUnavailable(format!("failed to create keyring entry: {e}"))
        })
    }

    impl Keychain for OsKeychain {
        fn store(&self, service: &str, account: &str, blob: &str) -> Result<()> {
            entry(service, account)?.set_password(blob).map_err(|e| {
                CofferError::KeychainUnavailable(format!("failed to store key in keyring: {e}"))
            })
        }

        fn fetch(&self, service: &str, account: &str) -> Result<Option<String>> {
            match entry(service, account)?.get_password() {
                Ok(blob) => Ok(Some(blob)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(CofferError::KeychainUnavailable(format!(
                    "failed to read from keyring: {e}"
                ))),
            }
        }

        fn delete(&self, service: &str, account: &str) -> Result<bool> {
            match entry(service, account)?.delete_credential() {
                Ok(()) => Ok(true),
                Err(keyring::Error::NoEntry) => Ok(false),
                Err(e) => Err(CofferError::KeychainUnavailable(format!(
                    "failed to delete from keyring: {e}"
                ))),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory and absent keychains
// ---------------------------------------------------------------------------

/// Process-local keychain.  Clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryKeychain {
    entries: Arc<Mutex<HashMap<(String, String), String>>>,
}

impl MemoryKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<(String, String), String>) -> T) -> Result<T> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| CofferError::KeychainUnavailable("memory keychain poisoned".into()))?;
        Ok(f(&mut guard))
    }
}

impl Keychain for MemoryKeychain {
    fn store(&self, service: &str, account: &str, blob: &str) -> Result<()> {
        self.with_entries(|m| {
            m.insert((service.to_string(), account.to_string()), blob.to_string());
        })
    }

    fn fetch(&self, service: &str, account: &str) -> Result<Option<String>> {
        self.with_entries(|m| m.get(&(service.to_string(), account.to_string())).cloned())
    }

    fn delete(&self, service: &str, account: &str) -> Result<bool> {
        self.with_entries(|m| {
            m.remove(&(service.to_string(), account.to_string()))
                .is_some()
        })
    }
}

/// A keychain that is never available.
pub struct NoKeychain;

impl Keychain for NoKeychain {
    fn store(&self, _: &str, _: &str, _: &str) -> Result<()> {
        Err(unavailable())
    }

    fn fetch(&self, _: &str, _: &str) -> Result<Option<String>> {
        Err(unavailable())
    }

    fn delete(&self, _: &str, _: &str) -> Result<bool> {
        Err(unavailable())
    }
}

fn unavailable() -> CofferError {
    CofferError::KeychainUnavailable(
        "this build has no OS keychain support (rebuild with --features keyring-store)".into(),
    )
}
