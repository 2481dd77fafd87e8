//! # Tether Domain
//!
//! Value types shared by every layer of the API-access stack.
//!
//! This crate contains:
//! - Credentials, identities and session events
//! - Request descriptors, transport requests and responses
//! - Cache entries and cache policies
//! - The `AppError` taxonomy and the infrastructure `TetherError`
//! - Configuration structures
//!
//! ## Architecture
//! - Depends only on the foundation tier of `tether-common`
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
