//! Record stores for vault metadata and encrypted credentials
//!
//! The core only talks to the [`MetadataStore`] and [`CredentialStore`]
//! traits. Two backends ship with it:
//! 1. In-memory (tests, ephemeral vaults)
//! 2. JSON file in the user's data directory

mod traits;
mod memory;
mod json_file;

pub use traits::{CredentialStore, MetadataStore};
pub use memory::MemoryStore;
pub use json_file::JsonFileStore;
