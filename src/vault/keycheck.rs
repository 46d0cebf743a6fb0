//! Password verification against the stored key-check value.
//!
//! At init a fixed constant is encrypted under the derived key.  A
//! candidate key is accepted only if that ciphertext decrypts and the
//! plaintext matches.  Every failure mode collapses into
//! `KeyCheck::Invalid`; callers never learn which step failed.

use subtle::ConstantTimeEq;

use crate::crypto::{self, EncryptionKey};
use crate::errors::{CofferError, Result};
use crate::store::VaultMeta;

/// Plaintext sealed into `vault_meta.key_check`.
pub const KEY_CHECK_PLAINTEXT: &[u8] = b"coffer-key-check-v1";

/// A key that has passed the key check.  Only `check_key` builds one.
pub struct VerifiedKey(EncryptionKey);

impl VerifiedKey {
    pub fn key(&self) -> &EncryptionKey {
        &self.0
    }

    pub fn into_key(self) -> EncryptionKey {
        self.0
    }
}

/// Outcome of checking a candidate key.
pub enum KeyCheck {
    Valid(VerifiedKey),
    Invalid,
}

impl KeyCheck {
    /// `Valid` as `Ok`, `Invalid` as `InvalidCredential`.
    pub fn into_verified(self) -> Result<VerifiedKey> {
        match self {
            Self::Valid(key) => Ok(key),
            Self::Invalid => Err(CofferError::InvalidCredential),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Encrypt the key-check constant under `key`, with no associated data.
///
/// Returns `(ciphertext, nonce)`.
pub fn seal_key_check(key: &EncryptionKey) -> Result<(Vec<u8>, Vec<u8>)> {
    crypto::encrypt(key.as_bytes(), KEY_CHECK_PLAINTEXT, &[])
}

/// Check `candidate` against the vault's key-check ciphertext.
pub fn check_key(candidate: EncryptionKey, meta: &VaultMeta) -> KeyCheck {
    let plaintext = match crypto::decrypt(
        candidate.as_bytes(),
        &meta.key_check,
        &meta.key_check_nonce,
        &[],
    ) {
        Ok(p) => p,
        Err(_) => return KeyCheck::Invalid,
    };

    let matches = plaintext.len() == KEY_CHECK_PLAINTEXT.len()
        && bool::from(plaintext.as_slice().ct_eq(KEY_CHECK_PLAINTEXT));

    if matches {
        KeyCheck::Valid(VerifiedKey(candidate))
    } else {
        KeyCheck::Invalid
    }
}
