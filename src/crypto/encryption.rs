//! AES-256-GCM authenticated encryption with associated data.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce and
//! returns it alongside the ciphertext so the store can keep them in
//! separate columns.  The associated data (the secret's key name) is
//! authenticated but not stored inside the ciphertext, so a row cannot
//! be relabelled to a different key without failing decryption.

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{CofferError, Result};

/// Size of the AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` with a 32-byte `key`, binding `aad` into the tag.
///
/// Returns `(ciphertext, nonce)`; the ciphertext includes the 16-byte tag.
pub fn encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let cipher = cipher_for(key)?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CofferError::EncryptionFailed(format!("encryption error: {e}")))?;

    Ok((ciphertext, nonce.to_vec()))
}

/// Decrypt a ciphertext produced by `encrypt`.
///
/// Key and nonce sizes are checked up front and reported as
/// `InvalidKeyMaterial`.  Every authentication failure (wrong key,
/// tampered bytes, different `aad`) collapses into `InvalidCredential`.
pub fn decrypt(key: &[u8], ciphertext: &[u8], nonce: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    if nonce.len() != NONCE_LEN {
        return Err(CofferError::InvalidKeyMaterial(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }

    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CofferError::InvalidCredential)
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LEN {
        return Err(CofferError::InvalidKeyMaterial(format!(
            "key must be {KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    Aes256Gcm::new_from_slice(key)
        .map_err(|e| CofferError::InvalidKeyMaterial(format!("invalid key length: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> [u8; KEY_LEN] {
        [7u8; KEY_LEN]
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let (_, n1) = encrypt(&key(), b"same", b"KEY").unwrap();
        let (_, n2) = encrypt(&key(), b"same", b"KEY").unwrap();
        assert_eq!(n1.len(), NONCE_LEN);
        assert_ne!(n1, n2);
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let (ct, nonce) = encrypt(&key(), b"", b"").unwrap();
        assert_eq!(decrypt(&key(), &ct, &nonce, b"").unwrap(), b"");
    }

    #[test]
    fn short_key_is_invalid_key_material() {
        let err = encrypt(&[0u8; 16], b"secret", b"").unwrap_err();
        assert!(matches!(err, CofferError::InvalidKeyMaterial(_)));

        let err = decrypt(&[0u8; 16], b"fake", &[0u8; NONCE_LEN], b"").unwrap_err();
        assert!(matches!(err, CofferError::InvalidKeyMaterial(_)));
    }

    #[test]
    fn short_nonce_is_invalid_key_material() {
        let err = decrypt(&key(), b"fake ciphertext", &[0u8; 8], b"").unwrap_err();
        assert!(matches!(err, CofferError::InvalidKeyMaterial(_)));
    }

    #[test]
    fn truncated_ciphertext_is_invalid_credential() {
        let (ct, nonce) = encrypt(&key(), b"secret", b"KEY").unwrap();
        let err = decrypt(&key(), &ct[..4], &nonce, b"KEY").unwrap_err();
        assert!(matches!(err, CofferError::InvalidCredential));
    }
}
