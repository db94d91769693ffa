//! Vault metadata - the singleton row that marks a vault as initialized

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::KdfParams;

/// Encryption scheme version written by this build
pub const CURRENT_ENC_VERSION: u32 = 1;

/// Vault metadata
///
/// At most one exists per vault; its presence is the sole signal that the
/// vault has been created. Holds the verifier, never the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultMetadata {
    #[serde(with = "hex")]
    pub kdf_salt: Vec<u8>,
    pub kdf_params: KdfParams,
    #[serde(with = "hex")]
    pub master_hash: Vec<u8>,
    pub enc_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VaultMetadata {
    pub fn new(kdf_salt: Vec<u8>, kdf_params: KdfParams, master_hash: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            kdf_salt,
            kdf_params,
            master_hash,
            enc_version: CURRENT_ENC_VERSION,
            created_at: now,
            updated_at: now,
        }
    }
}
