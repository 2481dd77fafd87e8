//! Domain value types

pub mod auth;
pub mod cache;
pub mod http;

pub use auth::{Credentials, Identity, LoginMethod, SessionEvent};
pub use cache::{CacheEntry, CachePolicy, CacheStrategy};
pub use http::{
    ApiResponse, Headers, HttpMethod, RequestDescriptor, TransportFailure, TransportRequest,
};
