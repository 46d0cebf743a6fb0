//! The vault: lifecycle, password checks, sessions, and keychain unlock.
//!
//! States: uninitialized → locked → unlocked → locked.  `initialize`
//! leaves the vault unlocked.  Only a `VerifiedKey` can start a session.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use super::keycheck::{check_key, seal_key_check, KeyCheck, VerifiedKey};
use super::session::{FileSessionStore, PlainSeal, Session, SessionSeal, SessionStore, WrappedSeal};
use crate::config::{DataDir, SessionSealKind, Settings};
use crate::crypto::{derive_key_with_params, generate_salt, Argon2Params, EncryptionKey};
use crate::errors::{CofferError, Result};
use crate::keyring::{default_keychain, Keychain, ACCOUNT_NAME, SERVICE_NAME};
use crate::store::{Store, VaultMeta};

/// Snapshot for `coffer status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStatus {
    pub initialized: bool,
    pub unlocked: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub keychain_enabled: bool,
    pub keychain_available: bool,
}

/// Vault over a store, a session store, and a keychain.
pub struct Vault {
    store: Store,
    sessions: Box<dyn SessionStore>,
    keychain: Box<dyn Keychain>,
    argon2: Argon2Params,
}

impl Vault {
    /// Assemble a vault from its parts.  `argon2` is only used by
    /// `initialize`; unlock uses the parameters stored in the vault.
    pub fn new(
        store: Store,
        sessions: Box<dyn SessionStore>,
        keychain: Box<dyn Keychain>,
        argon2: Argon2Params,
    ) -> Self {
        Self {
            store,
            sessions,
            keychain,
            argon2,
        }
    }

    /// Open the vault in `data_dir` with file sessions and the default keychain.
    pub fn open(data_dir: &DataDir, settings: &Settings) -> Result<Self> {
        data_dir.ensure()?;
        let store = Store::open(&data_dir.database(), settings.busy_timeout())?;

        let seal: Box<dyn SessionSeal> = match settings.session_seal {
            SessionSealKind::Wrapped => Box::new(WrappedSeal::new(data_dir.session_key())),
            SessionSealKind::Plain => Box::new(PlainSeal),
        };
        let sessions = FileSessionStore::new(data_dir.session(), seal);

        Ok(Self::new(
            store,
            Box::new(sessions),
            default_keychain(),
            settings.argon2_params(),
        ))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn meta(&self) -> Result<VaultMeta> {
        self.store.vault_meta()?.ok_or(CofferError::NotInitialized)
    }

    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.store.vault_meta()?.is_some())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create the vault and start a session.
    pub fn initialize(&self, password: &str) -> Result<()> {
        if self.is_initialized()? {
            return Err(CofferError::AlreadyInitialized);
        }

        let salt = generate_salt();
        let key = derive_key_with_params(password.as_bytes(), &salt, &self.argon2)?;
        let (key_check, key_check_nonce) = seal_key_check(&key)?;

        let meta = VaultMeta {
            salt: salt.to_vec(),
            key_check,
            key_check_nonce,
            argon2: self.argon2,
            keychain_enabled: false,
            created_at: Utc::now(),
        };

        // Prove the stored check opens before committing to it.
        let verified = check_key(key, &meta).into_verified()?;
        self.store.create_vault_meta(&meta)?;
        self.start_session(verified)?;

        tracing::info!(
            memory_kib = self.argon2.memory_kib,
            iterations = self.argon2.iterations,
            "vault initialized"
        );
        Ok(())
    }

    /// Verify `password` and start a new session.
    ///
    /// A failed unlock leaves any existing session untouched.
    pub fn unlock(&self, password: &str) -> Result<()> {
        let verified = self.verify_password(password)?;
        self.start_session(verified)?;
        tracing::info!("vault unlocked");
        Ok(())
    }

    /// End the session.  Idempotent.
    pub fn lock(&self) -> Result<()> {
        self.sessions.clear()?;
        tracing::info!("vault locked");
        Ok(())
    }

    /// Whether an unexpired session exists.  Never mutates the session.
    pub fn is_unlocked(&self) -> Result<bool> {
        Ok(self
            .sessions
            .load()?
            .is_some_and(|session| !session.is_expired()))
    }

    /// The session key.  An expired or unreadable session is removed on
    /// the way out; `is_unlocked` and `status` never remove anything.
    pub fn get_key(&self) -> Result<EncryptionKey> {
        match self.sessions.load()? {
            None => {
                self.sessions.clear()?;
                Err(CofferError::Locked)
            }
            Some(session) if session.is_expired() => {
                self.sessions.clear()?;
                tracing::info!("session expired");
                Err(CofferError::SessionExpired)
            }
            Some(session) => Ok(session.key().clone()),
        }
    }

    /// Derive a key from `password` and run the key check.
    pub fn check_password(&self, password: &str) -> Result<KeyCheck> {
        let meta = self.meta()?;
        let key = derive_key_with_params(password.as_bytes(), &meta.salt, &meta.argon2)?;
        Ok(check_key(key, &meta))
    }

    /// Like `check_password`, but `Invalid` is `InvalidCredential`.
    /// Never creates or touches a session.
    pub fn verify_password(&self, password: &str) -> Result<VerifiedKey> {
        self.check_password(password)?.into_verified()
    }

    fn start_session(&self, key: VerifiedKey) -> Result<Session> {
        let session = Session::new(key);
        self.sessions.save(&session)?;
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Keychain
    // ------------------------------------------------------------------

    /// Store the vault key in the keychain after checking `password`.
    pub fn enable_keychain(&self, password: &str) -> Result<()> {
        let verified = self.verify_password(password)?;
        let blob = Zeroizing::new(BASE64.encode(verified.key().as_bytes()));
        self.keychain.store(SERVICE_NAME, ACCOUNT_NAME, &blob)?;

        if let Err(e) = self.store.set_keychain_enabled(true) {
            if let Err(rollback) = self.keychain.delete(SERVICE_NAME, ACCOUNT_NAME) {
                tracing::warn!(error = %rollback, "failed to roll back keychain entry");
            }
            return Err(e);
        }

        tracing::info!("keychain unlock enabled");
        Ok(())
    }

    /// Remove the keychain entry (if any) and clear the flag.
    ///
    /// The flag is cleared even when the keychain cannot be reached, so a
    /// build without keychain support can still turn keychain unlock off.
    pub fn disable_keychain(&self) -> Result<()> {
        self.meta()?;
        match self.keychain.delete(SERVICE_NAME, ACCOUNT_NAME) {
            Ok(existed) => tracing::info!(existed, "keychain entry removed"),
            Err(e) => tracing::warn!(error = %e, "keychain unreachable, stored key left in place"),
        }
        self.store.set_keychain_enabled(false)?;
        tracing::info!("keychain unlock disabled");
        Ok(())
    }

    /// Unlock with the key cached in the keychain.
    ///
    /// The cached key still has to pass the key check, so an entry
    /// edited outside Coffer cannot grant access.
    pub fn unlock_with_keychain(&self) -> Result<()> {
        let meta = self.meta()?;
        if !meta.keychain_enabled {
            return Err(CofferError::KeychainNotEnabled);
        }

        let blob = self
            .keychain
            .fetch(SERVICE_NAME, ACCOUNT_NAME)?
            .map(Zeroizing::new)
            .ok_or_else(|| CofferError::NotFound("vault key in keychain".into()))?;

        let bytes = Zeroizing::new(
            BASE64
                .decode(blob.as_bytes())
                .map_err(|_| CofferError::InvalidCredential)?,
        );
        let key = EncryptionKey::from_slice(&bytes).map_err(|_| CofferError::InvalidCredential)?;

        let verified = check_key(key, &meta).into_verified()?;
        self.start_session(verified)?;
        tracing::info!("vault unlocked from keychain");
        Ok(())
    }

    pub fn keychain_enabled(&self) -> Result<bool> {
        Ok(self.meta()?.keychain_enabled)
    }

    pub fn keychain_available(&self) -> bool {
        self.keychain.is_available()
    }

    pub fn status(&self) -> Result<VaultStatus> {
        let meta = self.store.vault_meta()?;
        let session = self.sessions.load()?.filter(|s| !s.is_expired());
        Ok(VaultStatus {
            initialized: meta.is_some(),
            unlocked: session.is_some(),
            expires_at: session.map(|s| s.expires_at()),
            keychain_enabled: meta.is_some_and(|m| m.keychain_enabled),
            keychain_available: self.keychain_available(),
        })
    }
}
