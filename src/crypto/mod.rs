//! Cryptographic primitives for Coffer.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption with associated data (`encryption`)
//! - Argon2id password-based key derivation (`kdf`)
//! - The zeroizing `EncryptionKey` type and HKDF sub-keys (`keys`)

pub mod encryption;
pub mod kdf;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, derive_key_with_params, ...};
pub use encryption::{decrypt, encrypt, KEY_LEN, NONCE_LEN};
pub use kdf::{derive_key_with_params, generate_salt, Argon2Params, SALT_LEN};
pub use keys::EncryptionKey;
