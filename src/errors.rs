use thiserror::Error;

/// All errors that can occur in Coffer.
#[derive(Debug, Error)]
pub enum CofferError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong password, wrong key, tampered ciphertext, or mismatched
    /// associated data. Deliberately carries no detail.
    #[error("Invalid credential — wrong password or corrupted data")]
    InvalidCredential,

    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Vault lifecycle errors ---
    #[error("Vault not initialized — run `coffer init` first")]
    NotInitialized,

    #[error("Vault already initialized")]
    AlreadyInitialized,

    #[error("Vault is locked — run `coffer unlock` first")]
    Locked,

    #[error("Session expired — run `coffer unlock` again")]
    SessionExpired,

    // --- Keychain errors ---
    #[error("Keychain unavailable: {0}")]
    KeychainUnavailable(String),

    #[error("Keychain unlock not enabled — run `coffer keychain enable` first")]
    KeychainNotEnabled,

    // --- Store errors ---
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Cannot delete environment '{name}': it has child environments ({children})")]
    HasChildren { name: String, children: String },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("No active project — run `coffer project use <name>` first")]
    NoActiveProject,

    #[error("Cannot restore version {0}: it records a deletion")]
    CannotRestoreDeletion(i64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // --- Resolution errors ---
    #[error("Circular inheritance detected at environment '{0}'")]
    CircularInheritance(String),

    #[error("Inheritance chain of environment '{env}' exceeds {max} levels")]
    InheritanceTooDeep { env: String, max: usize },

    #[error("Circular reference detected for '{key}': {}", .path.join(" -> "))]
    CircularReference { key: String, path: Vec<String> },

    #[error("Unresolved reference in '{key}': ${{{reference}}} not found")]
    UnresolvedReference { key: String, reference: String },

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("Child process exited with code {0}")]
    ChildProcessFailed(i32),

    #[error("No command specified — use `coffer run --env <env> -- <command>`")]
    NoCommandSpecified,
}

/// Convenience type alias for Coffer results.
pub type Result<T> = std::result::Result<T, CofferError>;
