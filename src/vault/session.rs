//! Sessions: a cached vault key with a fixed expiry.
//!
//! A session lasts `SESSION_DURATION_HOURS` from creation; use does not
//! extend it.  Persistence goes through a `SessionStore`, and the file
//! store protects its bytes with a pluggable `SessionSeal`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::keycheck::VerifiedKey;
use crate::crypto::{self, EncryptionKey, NONCE_LEN};
use crate::errors::{CofferError, Result};

/// Lifetime of a session, counted from when it is created.
pub const SESSION_DURATION_HOURS: i64 = 8;

/// HKDF context for the session wrapping key.
const WRAP_CONTEXT: &str = "coffer-session-wrap-v1";

/// Associated data bound into a wrapped session file.
const WRAP_AAD: &[u8] = b"coffer-session";

/// An unlocked vault key and when it stops being valid.
#[derive(Clone)]
pub struct Session {
    key: EncryptionKey,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Start a session that expires `SESSION_DURATION_HOURS` from now.
    pub fn new(key: VerifiedKey) -> Self {
        Self::expiring_at(key, Utc::now() + Duration::hours(SESSION_DURATION_HOURS))
    }

    /// Start a session with an explicit expiry.
    pub fn expiring_at(key: VerifiedKey, expires_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into_key(),
            expires_at,
        }
    }

    pub fn key(&self) -> &EncryptionKey {
        &self.key
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    fn to_record(&self) -> SessionRecord {
        SessionRecord {
            key: Zeroizing::new(BASE64.encode(self.key.as_bytes())),
            expires_at: self.expires_at,
        }
    }

    fn from_record(record: &SessionRecord) -> Result<Self> {
        let bytes = Zeroizing::new(
            BASE64
                .decode(record.key.as_bytes())
                .map_err(|e| CofferError::Serialization(format!("session key: {e}")))?,
        );
        Ok(Self {
            key: EncryptionKey::from_slice(&bytes)?,
            expires_at: record.expires_at,
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// On-disk shape of a session.
#[derive(Serialize, Deserialize)]
struct SessionRecord {
    key: Zeroizing<String>,
    expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Session stores
// ---------------------------------------------------------------------------

/// Where the current session lives between invocations.
pub trait SessionStore {
    /// The stored session, expired or not.  `None` if there is none or
    /// it cannot be read.  Never modifies what is stored.
    fn load(&self) -> Result<Option<Session>>;

    /// Replace the stored session.
    fn save(&self, session: &Session) -> Result<()>;

    /// Remove the stored session.  Idempotent.
    fn clear(&self) -> Result<()>;
}

/// Session kept in process memory.  Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Session>>> {
        self.slot
            .lock()
            .map_err(|_| CofferError::CommandFailed("session store poisoned".into()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.slot()? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}

/// Session kept in a side file next to the database.
pub struct FileSessionStore {
    path: PathBuf,
    seal: Box<dyn SessionSeal>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>, seal: Box<dyn SessionSeal>) -> Self {
        Self {
            path: path.into(),
            seal,
        }
    }

    fn unreadable(&self, reason: &str) -> Result<Option<Session>> {
        tracing::debug!(path = %self.path.display(), reason, "ignoring unreadable session");
        Ok(None)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let sealed = std::fs::read(&self.path)?;
        let bytes = match self.seal.unseal(&sealed) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(CofferError::InvalidCredential | CofferError::InvalidKeyMaterial(_)) => {
                return self.unreadable("unseal failed")
            }
            Err(e) => return Err(e),
        };

        let Ok(record) = serde_json::from_slice::<SessionRecord>(&bytes) else {
            return self.unreadable("malformed record");
        };
        match Session::from_record(&record) {
            Ok(session) => Ok(Some(session)),
            Err(_) => self.unreadable("bad key material"),
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        let json = Zeroizing::new(
            serde_json::to_vec(&session.to_record())
                .map_err(|e| CofferError::Serialization(format!("session: {e}")))?,
        );
        let sealed = self.seal.seal(&json)?;
        write_private(&self.path, &sealed)?;
        tracing::debug!(expires_at = %session.expires_at(), "session saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.seal.discard()
    }
}

// ---------------------------------------------------------------------------
// Session seals
// ---------------------------------------------------------------------------

/// How session bytes are protected at rest.
pub trait SessionSeal {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>>;
    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>>;
    /// Forget any material the seal keeps.
    fn discard(&self) -> Result<()>;
}

/// No encryption; the file's owner-only permissions are the only guard.
pub struct PlainSeal;

impl SessionSeal for PlainSeal {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        Ok(sealed.to_vec())
    }

    fn discard(&self) -> Result<()> {
        Ok(())
    }
}

/// AES-GCM under a wrapping key stored in its own file.
///
/// Every `seal` writes a fresh wrapping key, so each new session gets a
/// new one.  `discard` deletes it, which makes any stale session file
/// unreadable.  File layout: `nonce || ciphertext`.
pub struct WrappedSeal {
    key_path: PathBuf,
}

impl WrappedSeal {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }

    fn wrapping_key(secret: &EncryptionKey) -> Result<EncryptionKey> {
        secret.derive_subkey(WRAP_CONTEXT)
    }
}

impl SessionSeal for WrappedSeal {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let secret = EncryptionKey::generate();
        write_private(&self.key_path, secret.as_bytes())?;

        let wrap = Self::wrapping_key(&secret)?;
        let (ciphertext, nonce) = crypto::encrypt(wrap.as_bytes(), plaintext, WRAP_AAD)?;

        let mut out = nonce;
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(CofferError::InvalidCredential);
        }
        let secret_bytes = Zeroizing::new(std::fs::read(&self.key_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CofferError::InvalidCredential
            } else {
                e.into()
            }
        })?);
        let secret = EncryptionKey::from_slice(&secret_bytes)?;
        let wrap = Self::wrapping_key(&secret)?;

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        crypto::decrypt(wrap.as_bytes(), ciphertext, nonce, WRAP_AAD)
    }

    fn discard(&self) -> Result<()> {
        match std::fs::remove_file(&self.key_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `bytes` to `path`, readable only by the owner on Unix.
fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    std::io::Write::write_all(&mut file, bytes)?;

    // The mode above only applies to newly created files.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::keycheck::{check_key, seal_key_check};
    use crate::crypto::Argon2Params;
    use crate::store::VaultMeta;
    use tempfile::TempDir;

    fn verified(key: &EncryptionKey) -> VerifiedKey {
        let (key_check, key_check_nonce) = seal_key_check(key).unwrap();
        let meta = VaultMeta {
            salt: vec![0; 16],
            key_check,
            key_check_nonce,
            argon2: Argon2Params::default(),
            keychain_enabled: false,
            created_at: Utc::now(),
        };
        check_key(key.clone(), &meta).into_verified().unwrap()
    }

    fn file_store(dir: &TempDir, wrapped: bool) -> FileSessionStore {
        let seal: Box<dyn SessionSeal> = if wrapped {
            Box::new(WrappedSeal::new(dir.path().join("session.key")))
        } else {
            Box::new(PlainSeal)
        };
        FileSessionStore::new(dir.path().join("session"), seal)
    }

    #[test]
    fn new_session_lasts_eight_hours() {
        let key = EncryptionKey::generate();
        let session = Session::new(verified(&key));
        let remaining = session.expires_at() - Utc::now();
        assert!(remaining > Duration::hours(7));
        assert!(remaining <= Duration::hours(SESSION_DURATION_HOURS));
        assert!(!session.is_expired());
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        assert!(store.load().unwrap().is_none());

        let key = EncryptionKey::generate();
        store.save(&Session::new(verified(&key))).unwrap();
        assert_eq!(store.load().unwrap().unwrap().key(), &key);

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn file_store_roundtrip_with_both_seals() {
        for wrapped in [false, true] {
            let dir = TempDir::new().unwrap();
            let store = file_store(&dir, wrapped);
            let key = EncryptionKey::generate();
            let session = Session::new(verified(&key));

            store.save(&session).unwrap();
            let loaded = store.load().unwrap().unwrap();
            assert_eq!(loaded.key(), &key);
            assert_eq!(loaded.expires_at(), session.expires_at());
        }
    }

    #[test]
    fn wrapped_session_file_does_not_contain_raw_key() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, true);
        let key = EncryptionKey::generate();
        store.save(&Session::new(verified(&key))).unwrap();

        let on_disk = std::fs::read(dir.path().join("session")).unwrap();
        let encoded = BASE64.encode(key.as_bytes());
        assert!(!String::from_utf8_lossy(&on_disk).contains(&encoded));
        assert!(dir.path().join("session.key").exists());
    }

    #[test]
    fn clear_removes_session_and_wrapping_key() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, true);
        store
            .save(&Session::new(verified(&EncryptionKey::generate())))
            .unwrap();

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!dir.path().join("session").exists());
        assert!(!dir.path().join("session.key").exists());
    }

    #[test]
    fn unreadable_session_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, true);
        store
            .save(&Session::new(verified(&EncryptionKey::generate())))
            .unwrap();

        // Losing the wrapping key makes the session unreadable.
        std::fs::remove_file(dir.path().join("session.key")).unwrap();
        assert!(store.load().unwrap().is_none());
        // Loading leaves the file for `clear` to remove.
        assert!(dir.path().join("session").exists());

        store.clear().unwrap();
        assert!(!dir.path().join("session").exists());
    }

    #[test]
    fn garbage_plain_session_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, false);
        std::fs::write(dir.path().join("session"), b"not json").unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(dir.path().join("session").exists());
    }

    #[test]
    fn wrapping_key_read_errors_are_reported() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, true);
        store
            .save(&Session::new(verified(&EncryptionKey::generate())))
            .unwrap();

        // A directory in place of the key file fails to read with an I/O error.
        std::fs::remove_file(dir.path().join("session.key")).unwrap();
        std::fs::create_dir(dir.path().join("session.key")).unwrap();

        assert!(matches!(store.load(), Err(CofferError::Io(_))));
        assert!(dir.path().join("session").exists());
    }

    #[cfg(unix)]
    #[test]
    fn session_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = file_store(&dir, true);
        store
            .save(&Session::new(verified(&EncryptionKey::generate())))
            .unwrap();

        for name in ["session", "session.key"] {
            let mode = std::fs::metadata(dir.path().join(name))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600, "{name}");
        }
    }
}
