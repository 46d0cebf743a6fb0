//! Vault module: who may decrypt, and for how long.
//!
//! This module provides:
//! - Key-check verification producing a `VerifiedKey` (`keycheck`)
//! - Time-bounded sessions, their stores, and at-rest seals (`session`)
//! - The `Vault` lifecycle and keychain unlock (`manager`)

pub mod keycheck;
pub mod manager;
pub mod session;

// Re-export the most commonly used items.
pub use keycheck::{KeyCheck, VerifiedKey, KEY_CHECK_PLAINTEXT};
pub use manager::{Vault, VaultStatus};
pub use session::{
    FileSessionStore, MemorySessionStore, PlainSeal, Session, SessionSeal, SessionStore,
    WrappedSeal, SESSION_DURATION_HOURS,
};
