//! Vault settings management
//!
//! Stores non-sensitive configuration in a plain JSON file.
//! Settings are readable while the vault is locked.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::crypto::KdfParams;
use crate::error::{Result, VaultError};
use crate::lockout::MAX_LOCKOUT_WINDOW;
use crate::password_policy::PasswordPolicy;

/// Longest idle timeout accepted (one week)
pub const MAX_AUTO_LOCK_SECS: u64 = 7 * 24 * 60 * 60;

/// Vault settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultSettings {
    /// Settings file version
    pub version: u32,
    /// Idle auto-lock timeout in seconds (0 = never)
    pub auto_lock_timeout_secs: u64,
    /// Arm the idle timer right after vault creation, not only after unlock
    pub auto_lock_on_create: bool,
    /// Consecutive failed unlocks before a cooldown starts
    pub lockout_threshold: u32,
    /// First cooldown window in seconds; doubles on each re-engagement
    pub lockout_base_secs: u64,
    /// Upper bound for the cooldown window in seconds
    pub lockout_max_secs: u64,
    /// Double the cooldown on each re-engagement instead of starting over
    pub lockout_escalation: bool,
    /// Strength rules for the master password and stored passwords
    pub password_policy: PasswordPolicy,
    /// Key derivation parameters for newly created vaults
    pub kdf: KdfParams,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            version: 1,
            auto_lock_timeout_secs: 5 * 60,
            auto_lock_on_create: false,
            lockout_threshold: 5,
            lockout_base_secs: 30,
            lockout_max_secs: 15 * 60,
            lockout_escalation: false,
            password_policy: PasswordPolicy::default(),
            kdf: KdfParams::default(),
        }
    }
}

impl VaultSettings {
    /// Idle timeout, `None` when auto-lock is disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.auto_lock_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs.min(MAX_AUTO_LOCK_SECS))),
        }
    }

    /// Reject out-of-range timers and a meaningless lockout policy
    pub fn validate(&self) -> Result<()> {
        if self.auto_lock_timeout_secs > MAX_AUTO_LOCK_SECS {
            return Err(VaultError::InvalidInput(format!(
                "autoLockTimeoutSecs must not exceed {}",
                MAX_AUTO_LOCK_SECS
            )));
        }
        if self.lockout_max_secs > MAX_LOCKOUT_WINDOW.as_secs() {
            return Err(VaultError::InvalidInput(format!(
                "lockoutMaxSecs must not exceed {}",
                MAX_LOCKOUT_WINDOW.as_secs()
            )));
        }
        if self.lockout_threshold == 0 {
            return Err(VaultError::InvalidInput(
                "lockoutThreshold must be at least 1".to_string(),
            ));
        }
        if self.lockout_max_secs < self.lockout_base_secs {
            return Err(VaultError::InvalidInput(
                "lockoutMaxSecs must not be below lockoutBaseSecs".to_string(),
            ));
        }
        self.kdf.validate()
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: VaultSettings,
}

impl SettingsManager {
    /// Load settings from `settings.json` in the given directory
    pub fn new(storage_dir: &Path) -> Result<Self> {
        let settings_file = storage_dir.join("settings.json");
        let settings = Self::load_from_file(&settings_file)?;
        settings.validate()?;

        Ok(Self {
            settings_file,
            settings,
        })
    }

    /// Load settings from file
    fn load_from_file(path: &Path) -> Result<VaultSettings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(VaultSettings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: VaultSettings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.settings)?;

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &VaultSettings {
        &self.settings
    }

    /// Update settings and save
    pub async fn update(&mut self, settings: VaultSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        self.save().await
    }

    /// Reset settings to defaults and delete settings file
    pub async fn reset(&mut self) -> Result<()> {
        self.settings = VaultSettings::default();

        if self.settings_file.exists() {
            tokio::fs::remove_file(&self.settings_file).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path()).unwrap();

        let settings = manager.get();
        assert_eq!(settings.auto_lock_timeout_secs, 300);
        assert_eq!(settings.idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(settings.lockout_threshold, 5);
        assert_eq!(settings.lockout_base_secs, 30);
        assert!(!settings.auto_lock_on_create);
        assert!(!settings.lockout_escalation);
        assert_eq!(settings.password_policy, PasswordPolicy::default());
    }

    #[test]
    fn test_zero_timeout_disables_auto_lock() {
        let settings = VaultSettings {
            auto_lock_timeout_secs: 0,
            ..VaultSettings::default()
        };
        assert_eq!(settings.idle_timeout(), None);
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut manager = SettingsManager::new(temp_dir.path()).unwrap();
            let settings = VaultSettings {
                auto_lock_timeout_secs: 60,
                lockout_threshold: 3,
                ..VaultSettings::default()
            };
            manager.update(settings).await.unwrap();
        }

        {
            let manager = SettingsManager::new(temp_dir.path()).unwrap();
            assert_eq!(manager.get().auto_lock_timeout_secs, 60);
            assert_eq!(manager.get().lockout_threshold, 3);
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("settings.json"),
            r#"{"autoLockTimeoutSecs": 120}"#,
        )
        .unwrap();

        let manager = SettingsManager::new(temp_dir.path()).unwrap();
        assert_eq!(manager.get().auto_lock_timeout_secs, 120);
        assert_eq!(manager.get().lockout_threshold, 5);
    }

    #[test]
    fn test_out_of_range_timers_rejected() {
        for settings in [
            VaultSettings {
                auto_lock_timeout_secs: u64::MAX,
                ..VaultSettings::default()
            },
            VaultSettings {
                lockout_base_secs: u64::MAX,
                lockout_max_secs: u64::MAX,
                ..VaultSettings::default()
            },
        ] {
            assert!(matches!(
                settings.validate(),
                Err(VaultError::InvalidInput(_))
            ));
        }

        let at_limit = VaultSettings {
            auto_lock_timeout_secs: MAX_AUTO_LOCK_SECS,
            ..VaultSettings::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_idle_timeout_is_clamped() {
        let settings = VaultSettings {
            auto_lock_timeout_secs: u64::MAX,
            ..VaultSettings::default()
        };
        assert_eq!(
            settings.idle_timeout(),
            Some(Duration::from_secs(MAX_AUTO_LOCK_SECS))
        );
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SettingsManager::new(temp_dir.path()).unwrap();

        let bad = VaultSettings {
            lockout_threshold: 0,
            ..VaultSettings::default()
        };
        assert!(matches!(
            manager.update(bad).await,
            Err(VaultError::InvalidInput(_))
        ));
        assert_eq!(manager.get().lockout_threshold, 5);
    }

    #[tokio::test]
    async fn test_reset() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = SettingsManager::new(temp_dir.path()).unwrap();
        manager
            .update(VaultSettings {
                auto_lock_timeout_secs: 10,
                ..VaultSettings::default()
            })
            .await
            .unwrap();
        assert!(temp_dir.path().join("settings.json").exists());

        manager.reset().await.unwrap();
        assert_eq!(manager.get(), &VaultSettings::default());
        assert!(!temp_dir.path().join("settings.json").exists());
    }
}
