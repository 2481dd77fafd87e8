pub mod logging;

pub use logging::{init_tracing, LogFormat, DEFAULT_FILTER};
