//! Credential records and the service that seals and opens them

mod service;
mod types;

pub use service::CredentialService;
pub use types::*;
