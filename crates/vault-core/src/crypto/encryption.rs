//! AES-256-GCM envelope encryption
//!
//! Stored layout: `ciphertext || auth_tag` with the 12-byte nonce kept
//! beside it. Every seal uses a fresh random nonce.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use super::{SessionKey, NONCE_LEN, TAG_LEN};
use crate::error::{Result, VaultError};

/// Generate a fresh random nonce (12 bytes for GCM)
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt plaintext using AES-256-GCM
///
/// Takes ownership of the plaintext buffer; it is zeroed when this returns,
/// on success and on failure alike.
///
/// # Returns
/// Ciphertext with the 16-byte authentication tag appended
pub fn seal(
    plaintext: Zeroizing<Vec<u8>>,
    key: &SessionKey,
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext.as_slice())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))
}

/// Decrypt and authenticate ciphertext using AES-256-GCM
///
/// Any tag failure (wrong key, wrong nonce, corrupted bytes) is reported as
/// the same `DecryptionError`, and no partial plaintext is ever returned.
/// The caller owns the returned buffer, which is zeroed on drop.
pub fn open(ciphertext: &[u8], key: &SessionKey, nonce: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_LEN || ciphertext.len() < TAG_LEN {
        return Err(VaultError::DecryptionError);
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| VaultError::DecryptionError)?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| VaultError::DecryptionError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_derivation::{derive_key, generate_salt};
    use crate::crypto::{KdfParams, SecretString};

    fn test_key() -> SessionKey {
        let salt = generate_salt();
        derive_key(
            &SecretString::from("test-password"),
            &salt,
            &KdfParams::insecure_fast(),
        )
        .unwrap()
    }

    fn plaintext(bytes: &[u8]) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(bytes.to_vec())
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let nonce = generate_nonce();

        let ciphertext = seal(plaintext(b"Hello, World!"), &key, &nonce).unwrap();
        let decrypted = open(&ciphertext, &key, &nonce).unwrap();

        assert_eq!(decrypted.as_slice(), b"Hello, World!");
        assert_eq!(ciphertext.len(), b"Hello, World!".len() + TAG_LEN);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let key = test_key();
        let nonce = generate_nonce();

        let ciphertext = seal(plaintext(b""), &key, &nonce).unwrap();
        assert_eq!(ciphertext.len(), TAG_LEN);
        assert!(open(&ciphertext, &key, &nonce).unwrap().is_empty());
    }

    #[test]
    fn test_different_nonces_produce_different_ciphertext() {
        let key = test_key();
        let n1 = generate_nonce();
        let n2 = generate_nonce();
        assert_ne!(n1, n2);

        let c1 = seal(plaintext(b"same plaintext"), &key, &n1).unwrap();
        let c2 = seal(plaintext(b"same plaintext"), &key, &n2).unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = test_key();
        let key2 = test_key(); // Different key due to different salt
        let nonce = generate_nonce();

        let ciphertext = seal(plaintext(b"secret data"), &key1, &nonce).unwrap();
        let result = open(&ciphertext, &key2, &nonce);

        assert!(matches!(result, Err(VaultError::DecryptionError)));
    }

    #[test]
    fn test_any_flipped_ciphertext_bit_fails() {
        let key = test_key();
        let nonce = generate_nonce();
        let ciphertext = seal(plaintext(b"secret"), &key, &nonce).unwrap();

        for byte in 0..ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = ciphertext.clone();
                tampered[byte] ^= 1 << bit;
                assert!(matches!(
                    open(&tampered, &key, &nonce),
                    Err(VaultError::DecryptionError)
                ));
            }
        }
    }

    #[test]
    fn test_flipped_nonce_bit_fails() {
        let key = test_key();
        let nonce = generate_nonce();
        let ciphertext = seal(plaintext(b"secret"), &key, &nonce).unwrap();

        for byte in 0..NONCE_LEN {
            let mut tampered = nonce;
            tampered[byte] ^= 0x01;
            assert!(matches!(
                open(&ciphertext, &key, &tampered),
                Err(VaultError::DecryptionError)
            ));
        }
    }

    #[test]
    fn test_malformed_inputs_fail() {
        let key = test_key();
        let nonce = generate_nonce();

        assert!(matches!(
            open(&[0u8; 4], &key, &nonce),
            Err(VaultError::DecryptionError)
        ));
        assert!(matches!(
            open(&[0u8; 32], &key, &nonce[..8]),
            Err(VaultError::DecryptionError)
        ));
    }
}
