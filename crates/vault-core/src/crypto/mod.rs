//! Cryptographic primitives for the vault
//!
//! This module provides:
//! - Argon2id key derivation from the master passphrase
//! - AES-256-GCM envelope encryption with per-operation nonces
//! - Secure memory handling with zeroize

mod encryption;
mod key_derivation;
mod secure_memory;

pub use encryption::{generate_nonce, open, seal};
pub use key_derivation::{
    constant_time_eq, derive_key, derive_verifier, generate_salt, verify, KdfAlgorithm, KdfParams,
};
pub use secure_memory::{SecretString, SessionKey};

/// Salt length in bytes
pub const SALT_LEN: usize = 16;
/// Verifier length in bytes
pub const VERIFIER_LEN: usize = 32;
/// Session key length in bytes (AES-256)
pub const KEY_LEN: usize = 32;
/// GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;
