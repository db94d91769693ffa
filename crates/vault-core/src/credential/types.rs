//! Credential type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Stored credential (encrypted)
///
/// `ciphertext`/`nonce` are only meaningful under the session key that was
/// live for `enc_version` when they were sealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Store-assigned identifier (0 until persisted)
    pub id: i64,

    pub email: String,

    pub website: String,

    /// AES-GCM ciphertext with the auth tag appended
    #[serde(with = "hex")]
    pub ciphertext: Vec<u8>,

    #[serde(with = "hex")]
    pub nonce: Vec<u8>,

    pub enc_version: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Create an unsaved record
    pub fn new(email: &str, website: &str, sealed: SealedPayload, enc_version: u32) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email: email.to_string(),
            website: website.to_string(),
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            enc_version,
            created_at: now,
            updated_at: now,
        }
    }

    /// Case-insensitive (email, website) identity, Unicode-aware
    pub fn same_account(&self, email: &str, website: &str) -> bool {
        eq_ignore_case(&self.email, email) && eq_ignore_case(&self.website, website)
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Output of sealing one plaintext under the session key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Decrypted credential value - automatically zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DecryptedCredential {
    /// The actual secret value
    value: String,
}

impl DecryptedCredential {
    /// Create a new decrypted credential
    pub fn new(value: String) -> Self {
        Self { value }
    }

    /// Get the secret value (use carefully)
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for DecryptedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedCredential")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// A credential with its password decrypted, for display
#[derive(Debug)]
pub struct CredentialView {
    pub id: i64,
    pub email: String,
    pub website: String,
    pub password: DecryptedCredential,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(email: &str, website: &str) -> CredentialRecord {
        let sealed = SealedPayload {
            ciphertext: vec![1, 2, 3],
            nonce: vec![0; 12],
        };
        CredentialRecord::new(email, website, sealed, 1)
    }

    #[test]
    fn test_same_account_ignores_case() {
        let rec = record("A@B.com", "Example.com");
        assert!(rec.same_account("a@b.com", "example.COM"));
        assert!(!rec.same_account("a@b.com", "other.com"));
        assert!(!rec.same_account("c@b.com", "example.com"));
    }

    #[test]
    fn test_same_account_non_ascii() {
        let rec = record("émile@x.com", "Société.fr");
        assert!(rec.same_account("ÉMILE@x.com", "société.FR"));
        assert!(!rec.same_account("emile@x.com", "société.fr"));
    }

    #[test]
    fn test_decrypted_debug_redacted() {
        let view = CredentialView {
            id: 1,
            email: "a@b.com".to_string(),
            website: "example.com".to_string(),
            password: DecryptedCredential::new("Secret123".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let debug = format!("{:?}", view);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("Secret123"));
    }
}
