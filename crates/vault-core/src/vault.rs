//! Main vault orchestration

use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::credential::{CredentialRecord, CredentialService, CredentialView};
use crate::crypto::SecretString;
use crate::error::{Result, VaultError};
use crate::lockout::LockoutPolicy;
use crate::session::{SessionEvent, VaultSession, VaultState};
use crate::settings::{SettingsManager, VaultSettings};
use crate::storage::{CredentialStore, JsonFileStore, MemoryStore, MetadataStore};

/// Main vault struct that orchestrates all functionality
pub struct Vault {
    /// Unlock state and session key
    session: VaultSession,
    /// Credential service
    credentials: CredentialService,
    /// Unlock attempt throttling (process memory only); held for the whole
    /// attempt so a cooldown is always seen before key derivation
    lockout: Mutex<LockoutPolicy>,
    settings: VaultSettings,
}

impl Vault {
    /// Create a vault over the given stores
    pub fn new(
        metadata_store: Arc<dyn MetadataStore>,
        credential_store: Arc<dyn CredentialStore>,
        settings: VaultSettings,
    ) -> Self {
        let session = VaultSession::new(metadata_store, &settings);
        let credentials = CredentialService::new(
            credential_store,
            session.clone(),
            settings.password_policy.clone(),
        );
        let lockout = Mutex::new(LockoutPolicy::from_settings(&settings));

        Self {
            session,
            credentials,
            lockout,
            settings,
        }
    }

    /// Create a vault that lives only in process memory
    pub fn in_memory(settings: VaultSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store, settings)
    }

    /// Open (or prepare) a vault file in the given directory
    pub async fn open_file(dir: &Path, settings: VaultSettings) -> Result<Self> {
        settings.validate()?;

        let store = Arc::new(JsonFileStore::open_in(dir).await?);
        info!("Using vault file {:?}", store.path());

        Ok(Self::new(store.clone(), store, settings))
    }

    /// Open the vault in the user's data directory with its saved settings
    pub async fn open_default() -> Result<Self> {
        let dir = JsonFileStore::default_dir()?;
        let settings = SettingsManager::new(&dir)?.get().clone();
        Self::open_file(&dir, settings).await
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    /// Get the current vault state
    pub async fn state(&self) -> Result<VaultState> {
        self.session.state().await
    }

    pub async fn is_initialized(&self) -> Result<bool> {
        self.session.is_initialized().await
    }

    pub async fn is_unlocked(&self) -> bool {
        self.session.is_unlocked().await
    }

    /// Subscribe to unlock/lock notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    /// Create a new vault with a master password
    pub async fn create(&self, password: SecretString) -> Result<()> {
        self.session.create(password).await
    }

    /// Unlock the vault with the master password
    ///
    /// Attempts during a cooldown are rejected before any key derivation.
    /// The failure that starts a cooldown is reported as `LockedOut`.
    pub async fn unlock(&self, password: SecretString) -> Result<()> {
        let mut lockout = self.lockout.lock().await;
        if lockout.is_locked_out() {
            return Err(VaultError::LockedOut {
                remaining_secs: lockout.remaining_seconds(),
            });
        }

        match self.session.unlock(password).await {
            Ok(()) => {
                lockout.record_success();
                Ok(())
            }
            Err(e) if e.is_invalid_credentials() => {
                match lockout.record_failure() {
                    Some(_) => Err(VaultError::LockedOut {
                        remaining_secs: lockout.remaining_seconds(),
                    }),
                    None => {
                        warn!("Failed unlock attempt {}", lockout.failures());
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Lock the vault (wipe the session key)
    pub async fn lock(&self) {
        self.session.lock().await;
    }

    /// Extend the session on user activity
    pub async fn reset_idle_timer(&self) -> Result<()> {
        self.session.reset_idle_timer().await
    }

    pub async fn is_locked_out(&self) -> bool {
        self.lockout.lock().await.is_locked_out()
    }

    /// Seconds until unlock attempts are accepted again
    pub async fn remaining_lockout_secs(&self) -> u64 {
        self.lockout.lock().await.remaining_seconds()
    }

    /// Add a credential
    pub async fn add_credential(
        &self,
        email: &str,
        website: &str,
        password: SecretString,
    ) -> Result<i64> {
        self.record_activity().await;
        self.credentials
            .add_credential(email, website, password)
            .await
    }

    /// Update a credential, optionally replacing its password
    pub async fn update_credential(
        &self,
        record: &CredentialRecord,
        new_password: Option<SecretString>,
    ) -> Result<()> {
        self.record_activity().await;
        self.credentials
            .update_credential(record, new_password)
            .await
    }

    /// Delete a credential
    pub async fn delete_credential(&self, id: i64) -> Result<()> {
        self.record_activity().await;
        self.credentials.delete_credential(id).await
    }

    /// Get a credential with its password decrypted
    pub async fn get_credential(&self, id: i64) -> Result<Option<CredentialView>> {
        self.record_activity().await;
        self.credentials.get_decrypted(id).await
    }

    /// List stored credentials without decrypting them
    pub async fn list_credentials(&self) -> Result<Vec<CredentialRecord>> {
        self.record_activity().await;
        self.credentials.list().await
    }

    /// List all credentials with their passwords decrypted
    pub async fn list_decrypted(&self) -> Result<Vec<CredentialView>> {
        self.record_activity().await;
        self.credentials.list_decrypted().await
    }

    /// Search credentials by email or website
    pub async fn search_credentials(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CredentialRecord>> {
        self.record_activity().await;
        self.credentials.search(query, limit, offset).await
    }

    /// Credential service for lower-level access
    pub fn credentials(&self) -> &CredentialService {
        &self.credentials
    }

    async fn record_activity(&self) {
        // Locked: nothing to extend, and listing is still allowed
        let _ = self.session.reset_idle_timer().await;
    }
}
