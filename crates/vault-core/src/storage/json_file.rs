//! JSON file record store
//!
//! Keeps the metadata row and the credential table in a single JSON file in
//! the user's data directory. Byte fields are hex-encoded; credential
//! payloads are already sealed by the caller, so the file itself is never
//! readable as plaintext.

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::memory::StoreData;
use super::{CredentialStore, MetadataStore};
use crate::credential::CredentialRecord;
use crate::error::{Result, VaultError};
use crate::metadata::VaultMetadata;

const FILE_VERSION: u32 = 1;
const VAULT_FILE_NAME: &str = "vault.json";

/// File format for persistent storage
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageFile {
    version: u32,
    metadata: Option<VaultMetadata>,
    next_id: i64,
    credentials: Vec<CredentialRecord>,
}

impl From<&StoreData> for StorageFile {
    fn from(data: &StoreData) -> Self {
        Self {
            version: FILE_VERSION,
            metadata: data.metadata.clone(),
            next_id: data.next_id,
            credentials: data.credentials.values().cloned().collect(),
        }
    }
}

impl From<StorageFile> for StoreData {
    fn from(file: StorageFile) -> Self {
        Self {
            metadata: file.metadata,
            next_id: file.next_id,
            credentials: file.credentials.into_iter().map(|r| (r.id, r)).collect(),
        }
    }
}

/// JSON file storage backend
pub struct JsonFileStore {
    path: PathBuf,
    /// In-memory copy of the file contents
    cache: RwLock<StoreData>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing contents if the file exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = if path.exists() {
            let contents = tokio::fs::read_to_string(&path).await?;
            let file: StorageFile = serde_json::from_str(&contents)?;
            if file.version != FILE_VERSION {
                return Err(VaultError::PersistenceError(format!(
                    "Unsupported vault file version: {}",
                    file.version
                )));
            }
            debug!("Loaded {} credentials from {:?}", file.credentials.len(), path);
            StoreData::from(file)
        } else {
            debug!("No existing vault file at {:?}", path);
            StoreData::default()
        };

        Ok(Self {
            path,
            cache: RwLock::new(data),
        })
    }

    /// Open the store in a directory, using the standard file name
    pub async fn open_in(dir: &Path) -> Result<Self> {
        Self::open(dir.join(VAULT_FILE_NAME)).await
    }

    /// Get the default data directory
    pub fn default_dir() -> Result<PathBuf> {
        ProjectDirs::from("com", "passvault", "passvault")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                VaultError::PersistenceError("Could not determine data directory".to_string())
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the given contents atomically using a temp file
    async fn persist(&self, data: &StoreData) -> Result<()> {
        let contents = serde_json::to_string_pretty(&StorageFile::from(data))?;

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| VaultError::PersistenceError(e.to_string()))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| VaultError::PersistenceError(e.to_string()))?;

        debug!("Saved {} credentials to {:?}", data.credentials.len(), self.path);
        Ok(())
    }

    /// Apply a mutation and persist it; the cache is only changed if the write succeeds
    async fn mutate<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T>) -> Result<T> {
        let mut cache = self.cache.write().await;

        let mut staged = cache.clone();
        let out = f(&mut staged)?;
        self.persist(&staged).await?;

        *cache = staged;
        Ok(out)
    }
}

#[async_trait]
impl MetadataStore for JsonFileStore {
    async fn insert(&self, metadata: &VaultMetadata) -> Result<()> {
        self.mutate(|data| data.insert_metadata(metadata)).await
    }

    async fn find(&self) -> Result<Option<VaultMetadata>> {
        Ok(self.cache.read().await.metadata.clone())
    }

    async fn update(&self, metadata: &VaultMetadata) -> Result<()> {
        self.mutate(|data| data.update_metadata(metadata)).await
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn add(&self, record: &CredentialRecord) -> Result<i64> {
        let id = self.mutate(|data| Ok(data.add(record))).await?;
        debug!("Stored credential {}", id);
        Ok(id)
    }

    async fn get_all(&self) -> Result<Vec<CredentialRecord>> {
        Ok(self.cache.read().await.credentials.values().cloned().collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<CredentialRecord>> {
        Ok(self.cache.read().await.credentials.get(&id).cloned())
    }

    async fn update(&self, record: &CredentialRecord) -> Result<()> {
        self.mutate(|data| data.update(record)).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.mutate(|data| data.delete(id)).await?;
        debug!("Deleted credential {}", id);
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<CredentialRecord>> {
        Ok(self.cache.read().await.search(query, limit, offset))
    }
}
