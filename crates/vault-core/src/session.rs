//! Vault session: lock state, the live session key and idle auto-lock
//!
//! All transitions (create, unlock, lock, idle-timer re-arm and the
//! auto-lock firing itself) go through one `tokio::sync::Mutex` around the
//! session state. The session key lives only inside that state; other
//! components borrow it for a single operation via [`VaultSession::with_unlocked`].

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::crypto::{
    derive_key, derive_verifier, generate_salt, verify, KdfParams, SecretString, SessionKey,
};
use crate::error::{Result, VaultError};
use crate::metadata::VaultMetadata;
use crate::password_policy::PasswordPolicy;
use crate::settings::VaultSettings;
use crate::storage::MetadataStore;

const EVENT_CAPACITY: usize = 16;

/// Vault state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No metadata has been persisted yet
    Uninitialized,
    /// Vault exists, no live key
    Locked,
    /// Live key held, idle timer armed
    Unlocked,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockReason {
    Manual,
    IdleTimeout,
}

/// Session transition notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Unlocked,
    Locked(LockReason),
}

/// Key and cached metadata that exist only while unlocked
pub struct UnlockedSession {
    key: SessionKey,
    metadata: VaultMetadata,
}

impl UnlockedSession {
    pub(crate) fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn metadata(&self) -> &VaultMetadata {
        &self.metadata
    }

    pub fn enc_version(&self) -> u32 {
        self.metadata.enc_version
    }
}

struct SessionState {
    unlocked: Option<UnlockedSession>,
    idle_deadline: Option<Instant>,
    auto_lock: Option<JoinHandle<()>>,
    /// Bumped on every arm/cancel so a stale timer never locks a newer session
    timer_generation: u64,
}

struct SessionInner {
    metadata_store: Arc<dyn MetadataStore>,
    kdf_params: KdfParams,
    idle_timeout: Option<Duration>,
    arm_on_create: bool,
    password_policy: PasswordPolicy,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionInner {
    fn cancel_auto_lock(state: &mut SessionState) {
        if let Some(handle) = state.auto_lock.take() {
            handle.abort();
        }
        state.idle_deadline = None;
        state.timer_generation = state.timer_generation.wrapping_add(1);
    }

    /// Wipe the key, drop cached metadata and cancel the timer
    fn clear(&self, state: &mut SessionState, reason: LockReason) {
        Self::cancel_auto_lock(state);

        // Dropping the session zeroes the key bytes
        if state.unlocked.take().is_some() {
            match reason {
                LockReason::Manual => info!("Vault locked"),
                LockReason::IdleTimeout => info!("Vault auto-locked after idle timeout"),
            }
            let _ = self.events.send(SessionEvent::Locked(reason));
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().auto_lock.take() {
            handle.abort();
        }
    }
}

/// Handle to the vault session (cheap to clone, all clones share one state)
#[derive(Clone)]
pub struct VaultSession {
    inner: Arc<SessionInner>,
}

impl VaultSession {
    pub fn new(metadata_store: Arc<dyn MetadataStore>, settings: &VaultSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(SessionInner {
                metadata_store,
                kdf_params: settings.kdf.clone(),
                idle_timeout: settings.idle_timeout(),
                arm_on_create: settings.auto_lock_on_create,
                password_policy: settings.password_policy.clone(),
                state: Mutex::new(SessionState {
                    unlocked: None,
                    idle_deadline: None,
                    auto_lock: None,
                    timer_generation: 0,
                }),
                events,
            }),
        }
    }

    /// Whether vault metadata has been persisted
    pub async fn is_initialized(&self) -> Result<bool> {
        Ok(self.inner.metadata_store.find().await?.is_some())
    }

    pub async fn is_unlocked(&self) -> bool {
        self.inner.state.lock().await.unlocked.is_some()
    }

    pub async fn state(&self) -> Result<VaultState> {
        if self.is_unlocked().await {
            return Ok(VaultState::Unlocked);
        }
        if self.is_initialized().await? {
            Ok(VaultState::Locked)
        } else {
            Ok(VaultState::Uninitialized)
        }
    }

    /// When the idle timer fires, if armed
    pub async fn idle_deadline(&self) -> Option<Instant> {
        self.inner.state.lock().await.idle_deadline
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Create a new vault and hold its session key
    ///
    /// The idle timer is only armed here when `auto_lock_on_create` is set.
    pub async fn create(&self, password: SecretString) -> Result<()> {
        self.inner.password_policy.check(&password)?;

        let mut state = self.inner.state.lock().await;

        if self.inner.metadata_store.find().await?.is_some() {
            return Err(VaultError::AlreadyExists);
        }

        info!("Creating new vault");

        let params = self.inner.kdf_params.clone();
        let (metadata, key) = tokio::task::spawn_blocking(move || -> Result<_> {
            let salt = generate_salt();
            let verifier = derive_verifier(&password, &salt, &params)?;
            let key = derive_key(&password, &salt, &params)?;
            Ok((VaultMetadata::new(salt.to_vec(), params, verifier[..].to_vec()), key))
        })
        .await
        .map_err(|e| VaultError::KeyDerivationError(e.to_string()))??;

        // Only commit the unlocked state once the metadata is durable
        self.inner.metadata_store.insert(&metadata).await?;

        state.unlocked = Some(UnlockedSession { key, metadata });
        if self.inner.arm_on_create {
            self.arm_auto_lock(&mut state);
        }
        let _ = self.inner.events.send(SessionEvent::Unlocked);

        info!("Vault created");
        Ok(())
    }

    /// Unlock the vault with the master password
    pub async fn unlock(&self, password: SecretString) -> Result<()> {
        let mut state = self.inner.state.lock().await;

        if state.unlocked.is_some() {
            return Err(VaultError::AlreadyUnlocked);
        }

        let metadata = self
            .inner
            .metadata_store
            .find()
            .await?
            .ok_or(VaultError::NotInitialized)?;

        let salt = metadata.kdf_salt.clone();
        let params = metadata.kdf_params.clone();
        let expected = metadata.master_hash.clone();
        let key = tokio::task::spawn_blocking(move || -> Result<Option<SessionKey>> {
            if !verify(&password, &salt, &params, &expected)? {
                return Ok(None);
            }
            derive_key(&password, &salt, &params).map(Some)
        })
        .await
        .map_err(|e| VaultError::KeyDerivationError(e.to_string()))??;

        let Some(key) = key else {
            debug!("Master password verification failed");
            return Err(VaultError::InvalidCredentials);
        };

        state.unlocked = Some(UnlockedSession { key, metadata });
        self.arm_auto_lock(&mut state);
        let _ = self.inner.events.send(SessionEvent::Unlocked);

        info!("Vault unlocked");
        Ok(())
    }

    /// Lock the vault (wipe the session key); a no-op when already locked
    pub async fn lock(&self) {
        let mut state = self.inner.state.lock().await;
        self.inner.clear(&mut state, LockReason::Manual);
    }

    /// Extend the session on user activity
    pub async fn reset_idle_timer(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.unlocked.is_none() {
            return Err(VaultError::VaultLocked);
        }
        self.arm_auto_lock(&mut state);
        Ok(())
    }

    /// Run `f` with the unlocked session, failing with `VaultLocked` otherwise
    ///
    /// The session state stays locked for the duration of `f`, so the key
    /// cannot be wiped mid-operation and must not escape the closure.
    pub async fn with_unlocked<T>(
        &self,
        f: impl FnOnce(&UnlockedSession) -> Result<T>,
    ) -> Result<T> {
        let state = self.inner.state.lock().await;
        let unlocked = state.unlocked.as_ref().ok_or(VaultError::VaultLocked)?;
        f(unlocked)
    }

    /// Encryption version of the cached metadata
    pub async fn enc_version(&self) -> Result<u32> {
        self.with_unlocked(|session| Ok(session.enc_version())).await
    }

    /// Schedule the single pending auto-lock, replacing any earlier one
    fn arm_auto_lock(&self, state: &mut SessionState) {
        SessionInner::cancel_auto_lock(state);

        let Some(timeout) = self.inner.idle_timeout else {
            return;
        };

        let generation = state.timer_generation;
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            debug!("Idle timeout out of range, auto-lock not armed");
            return;
        };
        state.idle_deadline = Some(deadline);

        let inner: Weak<SessionInner> = Arc::downgrade(&self.inner);
        state.auto_lock = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut state = inner.state.lock().await;
            if state.timer_generation != generation {
                return;
            }
            // This task is finishing; release its handle instead of aborting it
            state.auto_lock = None;
            inner.clear(&mut state, LockReason::IdleTimeout);
        }));

        debug!("Auto-lock armed for {}s", timeout.as_secs());
    }
}
