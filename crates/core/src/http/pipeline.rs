//! Request pipeline
//!
//! Single entry point for API calls. Pre-send, the pipeline routes cached
//! descriptors through the [`CacheStrategyEngine`], fails fast when offline,
//! attaches the bearer token and applies compression hints. Post-send, a 401
//! on an authenticated request triggers one token recovery and exactly one
//! retry; every other failure is classified and surfaced.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tether_common::compression::CompressionAlgorithm;
use tether_common::error::{ErrorClassification, ErrorSeverity};
use tether_domain::constants::{
    ACCEPT_ENCODING_HEADER, AUTHORIZATION_HEADER, COMPRESSION_HINT, CONTENT_ENCODING_HEADER,
    CONTENT_TYPE_HEADER, DEFAULT_COMPRESSION_THRESHOLD_BYTES, DEFAULT_TIMEOUT_MS,
    JSON_CONTENT_TYPE, RETRY_MARKER_HEADER,
};
use tether_domain::{
    ApiConfig, ApiResponse, AppError, PipelineConfig, RequestDescriptor, TransportRequest,
};
use tracing::field::Empty;
use tracing::{debug, error, info, instrument, warn, Span};
use url::Url;

use super::ports::{ConnectivityProbe, Transport};
use crate::auth::coordinator::RefreshCoordinator;
use crate::cache::key::CacheKey;
use crate::cache::strategy::CacheStrategyEngine;
use crate::classifier::{classify_failure, classify_response};

/// Tunables of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Used when a descriptor carries no timeout
    pub default_timeout: Duration,
    /// Bodies larger than this receive compression hints
    pub compression_threshold_bytes: usize,
    /// Gzip-encode bodies larger than the threshold
    pub compress_request_bodies: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            compression_threshold_bytes: DEFAULT_COMPRESSION_THRESHOLD_BYTES,
            compress_request_bodies: false,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(api: &ApiConfig, pipeline: &PipelineConfig) -> Self {
        Self {
            default_timeout: api.timeout(),
            compression_threshold_bytes: pipeline.compression_threshold_bytes,
            compress_request_bodies: pipeline.compress_request_bodies,
        }
    }
}

/// Request/response pipeline
#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
    cache: CacheStrategyEngine,
    connectivity: Arc<dyn ConnectivityProbe>,
    settings: PipelineSettings,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        coordinator: RefreshCoordinator,
        cache: CacheStrategyEngine,
        connectivity: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        Self { transport, coordinator, cache, connectivity, settings: PipelineSettings::default() }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn cache(&self) -> &CacheStrategyEngine {
        &self.cache
    }

    /// Execute a request
    ///
    /// # Errors
    /// Returns the classified [`AppError`] of the final attempt, or a
    /// `Network` error when offline without a usable cache entry.
    #[instrument(
        name = "api_request",
        skip_all,
        fields(method = %descriptor.method, url = %descriptor.url, outcome = Empty)
    )]
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<ApiResponse, AppError> {
        let result = match descriptor.cache_policy {
            Some(policy) => {
                let key = CacheKey::for_request(&descriptor);
                let pipeline = self.clone();
                self.cache
                    .resolve(&key, policy, move || async move {
                        pipeline.send_with_recovery(&descriptor).await
                    })
                    .await
            }
            None => {
                if self.connectivity.is_online().await {
                    self.send_with_recovery(&descriptor).await
                } else {
                    Err(AppError::offline())
                }
            }
        };

        let span = Span::current();
        match &result {
            Ok(response) if response.from_cache => span.record("outcome", "cache"),
            Ok(response) => span.record("outcome", response.status),
            Err(err) => {
                log_failure(err);
                span.record("outcome", err.kind.label())
            }
        };

        result
    }

    async fn send_with_recovery(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<ApiResponse, AppError> {
        let token = if descriptor.authenticated {
            self.coordinator.current_token().await?
        } else {
            None
        };

        let response = self.send(self.prepare(descriptor, token.as_deref(), false)?).await?;
        if response.is_success() {
            return Ok(response);
        }

        if response.status != 401 || !descriptor.authenticated {
            return Err(classify_response(&response));
        }

        debug!("request rejected with 401; recovering token");
        let fresh = match self.coordinator.recover_from_rejection(token.as_deref()).await {
            Ok(fresh) => fresh,
            // Anonymous requests keep the server's own rejection
            Err(_) if token.is_none() => return Err(classify_response(&response)),
            Err(err) => return Err(err),
        };

        let retried = self.send(self.prepare(descriptor, Some(&fresh), true)?).await?;
        if retried.is_success() {
            Ok(retried)
        } else {
            Err(classify_response(&retried))
        }
    }

    async fn send(&self, request: TransportRequest) -> Result<ApiResponse, AppError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        self.transport.send(request).await.map_err(|failure| classify_failure(&failure))
    }

    fn prepare(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
        retried: bool,
    ) -> Result<TransportRequest, AppError> {
        let url = build_url(&descriptor.url, descriptor.params.as_ref())?;
        let mut headers = descriptor.headers.clone();

        if let Some(token) = token.filter(|_| descriptor.authenticated) {
            headers.insert(AUTHORIZATION_HEADER.to_string(), format!("Bearer {token}"));
        }
        if retried {
            headers.insert(RETRY_MARKER_HEADER.to_string(), "1".to_string());
        }

        let mut body = match &descriptor.body {
            Some(json) => {
                let bytes = serde_json::to_vec(json)
                    .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))?;
                headers
                    .entry(CONTENT_TYPE_HEADER.to_string())
                    .or_insert_with(|| JSON_CONTENT_TYPE.to_string());
                Some(bytes)
            }
            None => None,
        };

        let threshold = self.settings.compression_threshold_bytes;
        if let Some(bytes) = body.as_mut().filter(|b| b.len() > threshold) {
            headers
                .entry(ACCEPT_ENCODING_HEADER.to_string())
                .or_insert_with(|| COMPRESSION_HINT.to_string());

            if self.settings.compress_request_bodies {
                let algorithm = CompressionAlgorithm::Gzip;
                match algorithm.compress(bytes) {
                    Ok(compressed) => {
                        *bytes = compressed;
                        headers.insert(
                            CONTENT_ENCODING_HEADER.to_string(),
                            algorithm.content_encoding().to_string(),
                        );
                    }
                    Err(err) => warn!(error = %err, "body compression failed; sending uncompressed"),
                }
            }
        }

        Ok(TransportRequest {
            method: descriptor.method,
            url,
            headers,
            body,
            timeout: descriptor.timeout.unwrap_or(self.settings.default_timeout),
        })
    }
}

/// Log a surfaced failure at a level matching its severity
fn log_failure(err: &AppError) {
    let retryable = err.is_retryable();
    let retry_after_ms = err.retry_after().map(|delay| delay.as_millis());
    match err.severity() {
        ErrorSeverity::Info => debug!(error = %err, retryable, "request failed"),
        ErrorSeverity::Warning => {
            info!(error = %err, retryable, ?retry_after_ms, "request failed");
        }
        ErrorSeverity::Error => {
            warn!(error = %err, status = ?err.http_status, retryable, ?retry_after_ms, "request failed");
        }
        ErrorSeverity::Critical => error!(error = %err, "request failed; session unrecoverable"),
    }
}

/// Append query parameters to `base`
///
/// Object keys are emitted in sorted order; arrays repeat the key, nested
/// objects are sent as JSON text and nulls are skipped.
fn build_url(base: &str, params: Option<&Value>) -> Result<String, AppError> {
    let mut url =
        Url::parse(base).map_err(|e| AppError::validation(format!("Invalid URL '{base}': {e}")))?;

    let Some(params) = params.filter(|p| !p.is_null()) else {
        return Ok(url.into());
    };
    let Value::Object(map) = params else {
        return Err(AppError::validation("Query parameters must be a JSON object"));
    };

    let mut names: Vec<_> = map.keys().collect();
    names.sort_unstable();

    {
        let mut query = url.query_pairs_mut();
        for name in names {
            let values: Vec<&Value> = match &map[name] {
                Value::Array(items) => items.iter().collect(),
                single => vec![single],
            };
            for value in values {
                match value {
                    Value::Null => {}
                    Value::String(text) => {
                        query.append_pair(name, text);
                    }
                    other => {
                        query.append_pair(name, &other.to_string());
                    }
                }
            }
        }
    }

    // An empty object leaves a dangling '?'
    if url.query() == Some("") {
        url.set_query(None);
    }
    Ok(url.into())
}
