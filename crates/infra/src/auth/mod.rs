//! Authentication adapters

pub mod backend;
pub mod keychain;

pub use backend::HttpAuthBackend;
pub use keychain::KeychainCredentialStore;
