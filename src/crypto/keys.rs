//! Key material held in memory.
//!
//! `EncryptionKey` wraps the 32-byte vault key and zeroes itself on drop.
//! The session seal derives its wrapping sub-key with HKDF-SHA256 so the
//! on-disk wrapping secret is never used directly as an AES key.

use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::encryption::KEY_LEN;
use crate::errors::{CofferError, Result};

/// A 32-byte symmetric key that is wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_LEN],
}

impl EncryptionKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a key from a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CofferError::InvalidKeyMaterial(format!(
                "key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub(crate) fn zeroed() -> Self {
        Self {
            bytes: [0u8; KEY_LEN],
        }
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_LEN] {
        &mut self.bytes
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = Self::zeroed();
        rand::rngs::OsRng.fill_bytes(&mut key.bytes);
        key
    }

    /// Derive an independent sub-key for `context` with HKDF-SHA256.
    pub fn derive_subkey(&self, context: &str) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(None, &self.bytes);
        let mut okm = Self::zeroed();
        hk.expand(context.as_bytes(), &mut okm.bytes)
            .map_err(|e| CofferError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;
        Ok(okm)
    }
}

impl PartialEq for EncryptionKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for EncryptionKey {}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}
