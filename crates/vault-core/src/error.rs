//! Error types for vault-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Vault error types
///
/// Payloads never carry passwords, plaintext or key material.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Vault already exists")]
    AlreadyExists,

    #[error("Vault is not initialized - create a new vault first")]
    NotInitialized,

    #[error("Vault is already unlocked")]
    AlreadyUnlocked,

    #[error("Invalid master password")]
    InvalidCredentials,

    #[error("Too many failed attempts - try again in {remaining_secs} seconds")]
    LockedOut { remaining_secs: u64 },

    #[error("Vault is locked - unlock with master password first")]
    VaultLocked,

    #[error("Unable to decrypt data")]
    DecryptionError,

    #[error("An account with this email and website already exists")]
    DuplicateCredential,

    #[error("Credential not found: {0}")]
    CredentialNotFound(i64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl VaultError {
    /// Whether this error should count as a failed unlock attempt
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, VaultError::InvalidCredentials)
    }
}
