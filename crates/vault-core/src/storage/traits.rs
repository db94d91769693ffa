//! Record store trait definitions

use crate::credential::CredentialRecord;
use crate::error::Result;
use crate::metadata::VaultMetadata;
use async_trait::async_trait;

/// Store for the singleton vault metadata row
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist the metadata; fails with `AlreadyExists` if one is present
    async fn insert(&self, metadata: &VaultMetadata) -> Result<()>;

    /// Load the metadata, `None` meaning the vault is uninitialized
    async fn find(&self) -> Result<Option<VaultMetadata>>;

    /// Replace the existing metadata
    async fn update(&self, metadata: &VaultMetadata) -> Result<()>;
}

/// Store for encrypted credential records, keyed by integer id
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a record and return its assigned id (the record's own id is ignored)
    async fn add(&self, record: &CredentialRecord) -> Result<i64>;

    /// All records ordered by id
    async fn get_all(&self) -> Result<Vec<CredentialRecord>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<CredentialRecord>>;

    /// Overwrite the record with the same id, refreshing `updated_at`
    async fn update(&self, record: &CredentialRecord) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Case-insensitive substring match on email or website, ordered by id
    async fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<CredentialRecord>>;
}

/// Shared search predicate for store implementations
pub(crate) fn matches_query(record: &CredentialRecord, query: &str) -> bool {
    let query = query.to_lowercase();
    record.email.to_lowercase().contains(&query) || record.website.to_lowercase().contains(&query)
}
