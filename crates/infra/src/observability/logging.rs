//! Tracing subscriber setup for hosts embedding the client

use std::str::FromStr;

use tether_domain::TetherError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info,tether=debug";

/// Output format of the `fmt` layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TetherError::Config(format!("unknown log format: {other}"))),
        }
    }
}

/// Install the global subscriber
///
/// Returns `false` when a subscriber was already installed; the existing one
/// is kept.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_target(true).boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().with_target(false).boxed(),
    };

    let installed = tracing_subscriber::registry().with(filter).with(layer).try_init().is_ok();
    if installed {
        tracing::debug!(?format, "tracing initialised");
    }
    installed
}
