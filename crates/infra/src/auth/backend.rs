//! Token endpoints of the API backend
//!
//! Both operations are plain JSON `POST`s sent through the same
//! [`Transport`] as regular traffic, but never through the request pipeline:
//! a 401 from the refresh endpoint must fail the cycle, not start another.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tether_common::time::{Clock, SystemClock};
use tether_core::{classify_failure, classify_response, AuthBackend, Transport};
use tether_domain::constants::{CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE};
use tether_domain::{
    ApiConfig, AppError, AuthConfig, Credentials, Headers, HttpMethod, Identity, TransportRequest,
};
use tracing::{debug, info};

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// [`AuthBackend`] calling `refresh_path` and `login_path` on the API
#[derive(Clone)]
pub struct HttpAuthBackend {
    transport: Arc<dyn Transport>,
    refresh_url: String,
    login_url: String,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl HttpAuthBackend {
    pub fn new(transport: Arc<dyn Transport>, api: &ApiConfig, auth: &AuthConfig) -> Self {
        Self {
            transport,
            refresh_url: api.url(&auth.refresh_path),
            login_url: api.url(&auth.login_path),
            timeout: api.timeout(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used to turn `expires_in` into an absolute expiry
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn post_for_tokens<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Credentials, AppError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| AppError::validation(format!("Invalid auth request: {e}")))?;

        let mut headers = Headers::new();
        headers.insert(CONTENT_TYPE_HEADER.to_string(), JSON_CONTENT_TYPE.to_string());

        let request = TransportRequest {
            method: HttpMethod::Post,
            url: url.to_string(),
            headers,
            body: Some(payload),
            timeout: self.timeout,
        };

        let response =
            self.transport.send(request).await.map_err(|failure| classify_failure(&failure))?;
        if !response.is_success() {
            debug!(url, status = response.status, "token endpoint rejected request");
            return Err(classify_response(&response));
        }

        let tokens: TokenResponse = response.json()?;
        let credentials = Credentials::new(tokens.access_token, tokens.refresh_token)?;

        Ok(match tokens.expires_in {
            Some(secs) => credentials.expiring_in(self.clock.now_utc(), secs),
            None => credentials,
        })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials, AppError> {
        debug!("exchanging refresh token");
        self.post_for_tokens(&self.refresh_url, &RefreshRequest { refresh_token }).await
    }

    async fn reauthenticate(&self, identity: &Identity) -> Result<Credentials, AppError> {
        info!(login_method = ?identity.login_method, "re-authenticating stored identity");
        self.post_for_tokens(&self.login_url, identity).await
    }
}
