//! Payload compression for request bodies
//!
//! The request pipeline gzips bodies above its threshold when configured to.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

/// Compression algorithms supported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    Gzip,
}

/// Compression failure
#[derive(Debug, thiserror::Error)]
#[error("{algorithm} compression failed: {source}")]
pub struct CompressionError {
    algorithm: &'static str,
    #[source]
    source: std::io::Error,
}

impl CompressionAlgorithm {
    /// Value used in `Content-Encoding` headers
    pub fn content_encoding(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
        }
    }

    /// Compress `data` at the default level
    ///
    /// # Errors
    /// Returns `CompressionError` if the encoder fails to write or finish.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let fail = |source| CompressionError { algorithm: self.content_encoding(), source };

        let compressed = match self {
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data).map_err(fail)?;
                encoder.finish().map_err(fail)?
            }
        };

        debug!(
            algorithm = self.content_encoding(),
            original = data.len(),
            compressed = compressed.len(),
            "payload compressed"
        );
        Ok(compressed)
    }
}
