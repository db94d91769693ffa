//! Password-based key derivation using Argon2id
//!
//! One master passphrase yields two independent 32-byte values: a verifier
//! that is persisted and compared on unlock, and the session key that is
//! only ever held in memory. The two are domain-separated by a purpose label
//! appended to the salt, so the stored verifier never equals the key.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{SecretString, SessionKey, KEY_LEN, SALT_LEN, VERIFIER_LEN};
use crate::error::{Result, VaultError};

const VERIFIER_PURPOSE: &[u8] = b"passvault:verifier:v1";
const SESSION_KEY_PURPOSE: &[u8] = b"passvault:session-key:v1";

/// Key derivation algorithm identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KdfAlgorithm {
    Argon2id,
}

/// Descriptor of the derivation algorithm and its tunables
///
/// Persisted with the vault metadata so a vault keeps unlocking with the
/// parameters it was created with, whatever the current defaults are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    pub algorithm: KdfAlgorithm,
    /// Memory cost in KiB (default: 65536 = 64MB)
    pub memory_cost: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
    pub salt_len: usize,
    pub key_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
            salt_len: SALT_LEN,
            key_len: KEY_LEN,
        }
    }
}

impl KdfParams {
    /// Reject descriptors this build cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.salt_len != SALT_LEN {
            return Err(VaultError::KeyDerivationError(format!(
                "Unsupported salt length: {}",
                self.salt_len
            )));
        }
        if self.key_len != KEY_LEN {
            return Err(VaultError::KeyDerivationError(format!(
                "Unsupported key length: {}",
                self.key_len
            )));
        }
        Ok(())
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        self.validate()?;
        let params = Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(self.key_len),
        )
        .map_err(|e| VaultError::KeyDerivationError(e.to_string()))?;

        let algorithm = match self.algorithm {
            KdfAlgorithm::Argon2id => Algorithm::Argon2id,
        };
        Ok(Argon2::new(algorithm, Version::V0x13, params))
    }

    /// Cheap parameters so tests do not spend seconds per derivation
    #[cfg(test)]
    pub(crate) fn insecure_fast() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            ..Self::default()
        }
    }
}

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

fn derive(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
    purpose: &[u8],
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let argon2 = params.argon2()?;

    let mut context = Vec::with_capacity(salt.len() + purpose.len());
    context.extend_from_slice(salt);
    context.extend_from_slice(purpose);

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), &context, &mut output[..])
        .map_err(|e| VaultError::KeyDerivationError(e.to_string()))?;

    Ok(output)
}

/// Derive the persisted verification value for a passphrase
pub fn derive_verifier(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; VERIFIER_LEN]>> {
    derive(password, salt, params, VERIFIER_PURPOSE)
}

/// Derive the 256-bit session key for a passphrase
///
/// The returned key must never be persisted.
pub fn derive_key(password: &SecretString, salt: &[u8], params: &KdfParams) -> Result<SessionKey> {
    let output = derive(password, salt, params, SESSION_KEY_PURPOSE)?;
    Ok(SessionKey::new(*output))
}

/// Recompute the verifier for `candidate` and compare it in constant time
pub fn verify(
    candidate: &SecretString,
    salt: &[u8],
    params: &KdfParams,
    expected: &[u8],
) -> Result<bool> {
    let computed = derive(candidate, salt, params, VERIFIER_PURPOSE)?;
    Ok(constant_time_eq(&computed[..], expected))
}

/// Compare two byte strings without exiting early on the first mismatch
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    std::hint::black_box(diff) == 0
}
