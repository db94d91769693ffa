//! # vault-core
//!
//! Core of a single-user credential vault:
//! - Argon2id master-key derivation with a constant-time verifier check
//! - AES-256-GCM envelope encryption of credential passwords
//! - Vault session state with idle auto-lock
//! - Brute-force lockout for unlock attempts
//! - Password strength policy for master and stored passwords
//! - Credential records with zeroize-on-drop plaintext

pub mod credential;
pub mod crypto;
pub mod error;
pub mod lockout;
pub mod metadata;
pub mod password_policy;
pub mod session;
pub mod settings;
pub mod storage;
mod vault;

pub use credential::{CredentialRecord, CredentialService, CredentialView, DecryptedCredential};
pub use crypto::{SecretString, SessionKey};
pub use error::{Result, VaultError};
pub use lockout::LockoutPolicy;
pub use metadata::VaultMetadata;
pub use password_policy::PasswordPolicy;
pub use session::{LockReason, SessionEvent, VaultSession, VaultState};
pub use settings::{SettingsManager, VaultSettings};
pub use storage::{CredentialStore, JsonFileStore, MemoryStore, MetadataStore};
pub use vault::Vault;
