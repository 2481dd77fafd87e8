//! Credential ports and single-flight token refresh

pub mod coordinator;
pub mod memory;
pub mod ports;

pub use coordinator::{RefreshCoordinator, RefreshCoordinatorBuilder};
pub use memory::{MemoryCredentialStore, MemoryIdentityStore};
pub use ports::{AuthBackend, CredentialStore, IdentityStore};
