//! Response caching: keys, persistence and strategy arbitration

pub mod key;
pub mod memory;
pub mod ports;
pub mod store;
pub mod strategy;

pub use key::CacheKey;
pub use memory::MemoryKv;
pub use ports::DurableKv;
pub use store::{CacheInvalidation, CacheStore};
pub use strategy::CacheStrategyEngine;
