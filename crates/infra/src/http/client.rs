use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method};
use tether_core::Transport;
use tether_domain::constants::DEFAULT_TIMEOUT_MS;
use tether_domain::{ApiResponse, Headers, HttpMethod, TetherError, TransportFailure, TransportRequest};
use tracing::debug;

use crate::errors::{transport_failure, InfraError};

/// [`Transport`] backed by a shared reqwest client
///
/// Each request is sent exactly once. Retrying is the pipeline's business
/// (one retry after a 401) or the caller's.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, TetherError> {
        Self::builder().build()
    }

    /// Borrow the underlying reqwest client.
    pub fn client(&self) -> &ReqwestClient {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<ApiResponse, TransportFailure> {
        let method = to_reqwest_method(request.method);
        let mut builder = self.client.request(method.clone(), &request.url).timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!(%method, url = %request.url, "sending HTTP request");

        let response = builder.send().await.map_err(|err| {
            debug!(%method, url = %request.url, error = %err, "HTTP request failed");
            transport_failure(&err)
        })?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes().await.map_err(|err| transport_failure(&err))?;

        debug!(%method, url = %request.url, status, bytes = body.len(), "received HTTP response");

        Ok(ApiResponse { status, headers, body: body.to_vec(), from_cache: false })
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Upper bound for a whole request; per-request timeouts override it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Add one default header, validating name and value
    pub fn default_header(mut self, name: &str, value: &str) -> Result<Self, TetherError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TetherError::Config(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TetherError::Config(format!("invalid header value: {e}")))?;

        self.default_headers.get_or_insert_with(HeaderMap::new).insert(name, value);
        Ok(self)
    }

    pub fn build(self) -> Result<ReqwestTransport, TetherError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| TetherError::from(InfraError::from(err)))?;

        Ok(ReqwestTransport { client })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

/// Lower-cased header map; repeated headers are joined with ", "
fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}
