//! In-memory record store
//!
//! Also provides the table logic shared with the JSON file backend.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::matches_query;
use super::{CredentialStore, MetadataStore};
use crate::credential::CredentialRecord;
use crate::error::{Result, VaultError};
use crate::metadata::VaultMetadata;

/// Metadata row plus the credential table
#[derive(Debug, Clone)]
pub(crate) struct StoreData {
    pub(crate) metadata: Option<VaultMetadata>,
    pub(crate) next_id: i64,
    pub(crate) credentials: BTreeMap<i64, CredentialRecord>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            metadata: None,
            next_id: 1,
            credentials: BTreeMap::new(),
        }
    }
}

impl StoreData {
    pub(crate) fn insert_metadata(&mut self, metadata: &VaultMetadata) -> Result<()> {
        if self.metadata.is_some() {
            return Err(VaultError::AlreadyExists);
        }
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    pub(crate) fn update_metadata(&mut self, metadata: &VaultMetadata) -> Result<()> {
        if self.metadata.is_none() {
            return Err(VaultError::NotInitialized);
        }
        let mut updated = metadata.clone();
        updated.updated_at = Utc::now();
        self.metadata = Some(updated);
        Ok(())
    }

    pub(crate) fn add(&mut self, record: &CredentialRecord) -> i64 {
        let id = self.next_id;
        self.next_id += 1;

        let now = Utc::now();
        let mut stored = record.clone();
        stored.id = id;
        stored.created_at = now;
        stored.updated_at = now;
        self.credentials.insert(id, stored);
        id
    }

    pub(crate) fn update(&mut self, record: &CredentialRecord) -> Result<()> {
        let existing = self
            .credentials
            .get_mut(&record.id)
            .ok_or(VaultError::CredentialNotFound(record.id))?;

        let created_at = existing.created_at;
        *existing = record.clone();
        existing.created_at = created_at;
        existing.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn delete(&mut self, id: i64) -> Result<()> {
        self.credentials
            .remove(&id)
            .map(|_| ())
            .ok_or(VaultError::CredentialNotFound(id))
    }

    pub(crate) fn search(&self, query: &str, limit: usize, offset: usize) -> Vec<CredentialRecord> {
        self.credentials
            .values()
            .filter(|r| matches_query(r, query))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Record store that lives only as long as the process
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn insert(&self, metadata: &VaultMetadata) -> Result<()> {
        self.data.write().await.insert_metadata(metadata)
    }

    async fn find(&self) -> Result<Option<VaultMetadata>> {
        Ok(self.data.read().await.metadata.clone())
    }

    async fn update(&self, metadata: &VaultMetadata) -> Result<()> {
        self.data.write().await.update_metadata(metadata)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn add(&self, record: &CredentialRecord) -> Result<i64> {
        let id = self.data.write().await.add(record);
        debug!("Stored credential {}", id);
        Ok(id)
    }

    async fn get_all(&self) -> Result<Vec<CredentialRecord>> {
        Ok(self.data.read().await.credentials.values().cloned().collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<CredentialRecord>> {
        Ok(self.data.read().await.credentials.get(&id).cloned())
    }

    async fn update(&self, record: &CredentialRecord) -> Result<()> {
        self.data.write().await.update(record)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.data.write().await.delete(id)?;
        debug!("Deleted credential {}", id);
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<CredentialRecord>> {
        Ok(self.data.read().await.search(query, limit, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::SealedPayload;
    use crate::crypto::KdfParams;

    fn record(email: &str, website: &str) -> CredentialRecord {
        let sealed = SealedPayload {
            ciphertext: vec![9; 24],
            nonce: vec![0; 12],
        };
        CredentialRecord::new(email, website, sealed, 1)
    }

    #[tokio::test]
    async fn test_metadata_singleton() {
        let store = MemoryStore::new();
        assert!(store.find().await.unwrap().is_none());

        let meta = VaultMetadata::new(vec![1; 16], KdfParams::default(), vec![2; 32]);
        store.insert(&meta).await.unwrap();
        assert_eq!(store.find().await.unwrap(), Some(meta.clone()));

        let result = store.insert(&meta).await;
        assert!(matches!(result, Err(VaultError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_metadata_update_requires_existing() {
        let store = MemoryStore::new();
        let mut meta = VaultMetadata::new(vec![1; 16], KdfParams::default(), vec![2; 32]);

        assert!(matches!(
            MetadataStore::update(&store, &meta).await,
            Err(VaultError::NotInitialized)
        ));

        store.insert(&meta).await.unwrap();
        meta.enc_version = 2;
        MetadataStore::update(&store, &meta).await.unwrap();
        assert_eq!(store.find().await.unwrap().unwrap().enc_version, 2);
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = MemoryStore::new();
        assert_eq!(store.add(&record("a@b.com", "one.com")).await.unwrap(), 1);
        assert_eq!(store.add(&record("a@b.com", "two.com")).await.unwrap(), 2);

        store.delete(2).await.unwrap();
        assert_eq!(store.add(&record("a@b.com", "three.com")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let store = MemoryStore::new();
        let mut missing = record("a@b.com", "x.com");
        missing.id = 42;

        assert!(matches!(
            CredentialStore::update(&store, &missing).await,
            Err(VaultError::CredentialNotFound(42))
        ));
        assert!(matches!(
            store.delete(42).await,
            Err(VaultError::CredentialNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let store = MemoryStore::new();
        let id = store.add(&record("a@b.com", "x.com")).await.unwrap();
        let original = store.get_by_id(id).await.unwrap().unwrap();

        let mut changed = original.clone();
        changed.website = "y.com".to_string();
        changed.created_at = Utc::now() + chrono::Duration::days(1);
        CredentialStore::update(&store, &changed).await.unwrap();

        let stored = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.website, "y.com");
        assert_eq!(stored.created_at, original.created_at);
        assert!(stored.updated_at >= original.updated_at);
    }

    #[tokio::test]
    async fn test_search() {
        let store = MemoryStore::new();
        store.add(&record("alice@mail.com", "github.com")).await.unwrap();
        store.add(&record("bob@mail.com", "GitLab.com")).await.unwrap();
        store.add(&record("carol@work.org", "example.com")).await.unwrap();

        let hits = store.search("git", 10, 0).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].email, "alice@mail.com");

        let hits = store.search("MAIL.COM", 10, 0).await.unwrap();
        assert_eq!(hits.len(), 2);

        let page = store.search("", 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].email, "bob@mail.com");

        assert!(store.search("nothing", 10, 0).await.unwrap().is_empty());
    }
}
