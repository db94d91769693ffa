//! Credential service: seals plaintext credentials into storable records and
//! opens them again, gated by the vault session

use std::sync::Arc;
use tracing::{debug, info};
use zeroize::{Zeroize, Zeroizing};

use super::types::{CredentialRecord, CredentialView, DecryptedCredential, SealedPayload};
use crate::crypto::{generate_nonce, open, seal, SecretString};
use crate::error::{Result, VaultError};
use crate::password_policy::PasswordPolicy;
use crate::session::{UnlockedSession, VaultSession};
use crate::storage::CredentialStore;

/// Credential service
pub struct CredentialService {
    /// Record store
    store: Arc<dyn CredentialStore>,
    /// Session that owns the key
    session: VaultSession,
    /// Rules for stored passwords
    password_policy: PasswordPolicy,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        session: VaultSession,
        password_policy: PasswordPolicy,
    ) -> Self {
        Self {
            store,
            session,
            password_policy,
        }
    }

    /// Seal a plaintext under the current session key with a fresh nonce
    ///
    /// The plaintext is wiped on every path, including `VaultLocked`.
    pub async fn encrypt_for_storage(&self, plaintext: SecretString) -> Result<SealedPayload> {
        let (sealed, _) = self.seal_versioned(plaintext).await?;
        Ok(sealed)
    }

    /// Open a stored ciphertext; the caller owns (and wipes) the result
    pub async fn decrypt_from_storage(
        &self,
        ciphertext: &[u8],
        nonce: &[u8],
    ) -> Result<DecryptedCredential> {
        self.session
            .with_unlocked(|session| open_record(session, ciphertext, nonce))
            .await
    }

    /// Add a new credential, returning its store id
    pub async fn add_credential(
        &self,
        email: &str,
        website: &str,
        password: SecretString,
    ) -> Result<i64> {
        let email = email.trim();
        let website = website.trim();
        validate_account(email, website)?;
        self.password_policy.check(&password)?;

        self.ensure_unlocked().await?;
        self.ensure_unique(email, website, None).await?;

        let (sealed, enc_version) = self.seal_versioned(password).await?;
        let record = CredentialRecord::new(email, website, sealed, enc_version);
        let id = self.store.add(&record).await?;

        info!("Added credential {} ({})", id, website);
        Ok(id)
    }

    /// Update a credential's email/website and, optionally, its password
    ///
    /// Uniqueness is only re-checked when the (email, website) pair changed.
    /// Without a new password the stored ciphertext is left as it is.
    pub async fn update_credential(
        &self,
        record: &CredentialRecord,
        new_password: Option<SecretString>,
    ) -> Result<()> {
        self.ensure_unlocked().await?;

        let email = record.email.trim();
        let website = record.website.trim();
        validate_account(email, website)?;

        let existing = self
            .store
            .get_by_id(record.id)
            .await?
            .ok_or(VaultError::CredentialNotFound(record.id))?;

        if !existing.same_account(email, website) {
            self.ensure_unique(email, website, Some(existing.id)).await?;
        }

        let mut updated = existing;
        updated.email = email.to_string();
        updated.website = website.to_string();

        // An empty replacement means "keep the current password"
        if let Some(password) = new_password.filter(|p| !p.is_empty()) {
            self.password_policy.check(&password)?;
            let (sealed, enc_version) = self.seal_versioned(password).await?;
            updated.ciphertext = sealed.ciphertext;
            updated.nonce = sealed.nonce;
            updated.enc_version = enc_version;
            debug!("Re-encrypted credential {}", updated.id);
        }

        self.store.update(&updated).await?;

        info!("Updated credential {}", updated.id);
        Ok(())
    }

    /// Delete a credential
    pub async fn delete_credential(&self, id: i64) -> Result<()> {
        self.ensure_unlocked().await?;
        self.store.delete(id).await?;

        info!("Deleted credential {}", id);
        Ok(())
    }

    /// Get a stored (still encrypted) credential by id
    pub async fn get(&self, id: i64) -> Result<Option<CredentialRecord>> {
        self.store.get_by_id(id).await
    }

    /// List all stored (still encrypted) credentials
    pub async fn list(&self) -> Result<Vec<CredentialRecord>> {
        self.store.get_all().await
    }

    /// Search stored credentials by email or website substring
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CredentialRecord>> {
        self.store.search(query.trim(), limit, offset).await
    }

    /// Get a credential with its password decrypted
    pub async fn get_decrypted(&self, id: i64) -> Result<Option<CredentialView>> {
        self.ensure_unlocked().await?;

        let Some(record) = self.store.get_by_id(id).await? else {
            return Ok(None);
        };

        let view = self
            .session
            .with_unlocked(|session| view_of(session, record))
            .await?;

        debug!("Decrypted credential {}", id);
        Ok(Some(view))
    }

    /// List all credentials with their passwords decrypted
    pub async fn list_decrypted(&self) -> Result<Vec<CredentialView>> {
        self.ensure_unlocked().await?;

        let records = self.store.get_all().await?;
        self.session
            .with_unlocked(|session| {
                records
                    .into_iter()
                    .map(|record| view_of(session, record))
                    .collect::<Result<Vec<_>>>()
            })
            .await
    }

    async fn ensure_unlocked(&self) -> Result<()> {
        self.session.with_unlocked(|_| Ok(())).await
    }

    async fn ensure_unique(&self, email: &str, website: &str, exclude: Option<i64>) -> Result<()> {
        let candidates = self.store.search(email, usize::MAX, 0).await?;
        let duplicate = candidates
            .iter()
            .any(|r| Some(r.id) != exclude && r.same_account(email, website));

        if duplicate {
            return Err(VaultError::DuplicateCredential);
        }
        Ok(())
    }

    async fn seal_versioned(&self, plaintext: SecretString) -> Result<(SealedPayload, u32)> {
        let bytes = Zeroizing::new(plaintext.as_bytes().to_vec());
        drop(plaintext);

        self.session
            .with_unlocked(move |session| {
                let nonce = generate_nonce();
                let ciphertext = seal(bytes, session.key(), &nonce)?;
                let sealed = SealedPayload {
                    ciphertext,
                    nonce: nonce.to_vec(),
                };
                Ok((sealed, session.enc_version()))
            })
            .await
    }
}

fn validate_account(email: &str, website: &str) -> Result<()> {
    if email.is_empty() {
        return Err(VaultError::InvalidInput("Email cannot be empty".to_string()));
    }
    if website.is_empty() {
        return Err(VaultError::InvalidInput("Website cannot be empty".to_string()));
    }
    Ok(())
}

fn open_record(
    session: &UnlockedSession,
    ciphertext: &[u8],
    nonce: &[u8],
) -> Result<DecryptedCredential> {
    let mut plaintext = open(ciphertext, session.key(), nonce)?;
    let bytes = std::mem::take(&mut *plaintext);

    match String::from_utf8(bytes) {
        Ok(value) => Ok(DecryptedCredential::new(value)),
        Err(e) => {
            e.into_bytes().zeroize();
            Err(VaultError::DecryptionError)
        }
    }
}

fn view_of(session: &UnlockedSession, record: CredentialRecord) -> Result<CredentialView> {
    let password = open_record(session, &record.ciphertext, &record.nonce)?;
    Ok(CredentialView {
        id: record.id,
        email: record.email,
        website: record.website,
        password,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}
