//! Strength rules for master and credential passwords

use serde::{Deserialize, Serialize};

use crate::crypto::SecretString;
use crate::error::{Result, VaultError};

/// Minimum length and character-class requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordPolicy {
    /// Minimum length in characters
    pub min_length: usize,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_lowercase: true,
            require_uppercase: true,
            require_digit: true,
        }
    }
}

impl PasswordPolicy {
    /// Accept any non-empty password
    pub fn permissive() -> Self {
        Self {
            min_length: 0,
            require_lowercase: false,
            require_uppercase: false,
            require_digit: false,
        }
    }

    /// Check a password; the error never echoes the password
    pub fn check(&self, password: &SecretString) -> Result<()> {
        if password.is_empty() {
            return Err(VaultError::InvalidInput(
                "Password cannot be empty".to_string(),
            ));
        }

        let value = password.expose();
        let satisfied = value.chars().count() >= self.min_length
            && (!self.require_lowercase || value.chars().any(|c| c.is_ascii_lowercase()))
            && (!self.require_uppercase || value.chars().any(|c| c.is_ascii_uppercase()))
            && (!self.require_digit || value.chars().any(|c| c.is_ascii_digit()));

        if satisfied {
            Ok(())
        } else {
            Err(VaultError::InvalidInput(self.describe()))
        }
    }

    fn describe(&self) -> String {
        let mut classes = Vec::new();
        if self.require_uppercase {
            classes.push("uppercase");
        }
        if self.require_lowercase {
            classes.push("lowercase");
        }
        if self.require_digit {
            classes.push("a number");
        }

        let mut message = format!(
            "Password must be at least {} characters long",
            self.min_length
        );
        if !classes.is_empty() {
            message.push_str(", with ");
            message.push_str(&classes.join(", "));
        }
        message
    }
}
