//! Protocol constants
//!
//! Header names and defaults shared by the pipeline and the adapters.

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const CONTENT_TYPE_HEADER: &str = "content-type";
pub const CONTENT_ENCODING_HEADER: &str = "content-encoding";
pub const ACCEPT_ENCODING_HEADER: &str = "accept-encoding";
/// Marks the single retry issued after a token refresh.
pub const RETRY_MARKER_HEADER: &str = "x-tether-retry";

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const COMPRESSION_HINT: &str = "gzip, deflate";

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_COMPRESSION_THRESHOLD_BYTES: usize = 1024;
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 60;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3_000;

/// Namespace prefix of cache entries inside the durable store.
pub const CACHE_NAMESPACE: &str = "cache:";
