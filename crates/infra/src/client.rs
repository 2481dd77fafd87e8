//! API client facade
//!
//! Wires the production adapters (reqwest transport, keychain credentials,
//! HTTP token endpoints, SQLite cache, HTTP connectivity probe) into a
//! [`RequestPipeline`] built from a [`TetherConfig`]. Every port can be
//! replaced on the builder.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tether_common::time::{Clock, SystemClock};
use tether_core::{
    AuthBackend, CacheInvalidation, CacheStore, CacheStrategyEngine, ConnectivityProbe,
    CredentialStore, DurableKv, IdentityStore, MemoryKv, PipelineSettings, RefreshCoordinator,
    RequestPipeline, Transport,
};
use tether_domain::{
    ApiResponse, AppError, CachePolicy, Credentials, RequestDescriptor, Result, SessionEvent,
    TetherConfig,
};
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::auth::{HttpAuthBackend, KeychainCredentialStore};
use crate::http::{HttpConnectivityProbe, ReqwestTransport};
use crate::storage::SqliteKv;

/// Entry point for API calls
#[derive(Clone)]
pub struct ApiClient {
    pipeline: RequestPipeline,
    config: Arc<TetherConfig>,
}

impl ApiClient {
    /// Create a builder for fluent configuration
    pub fn builder(config: TetherConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Build a client with the production adapters
    ///
    /// # Errors
    /// Returns `TetherError` if the configuration is invalid or an adapter
    /// cannot be created.
    pub fn from_config(config: TetherConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &TetherConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// Run a descriptor through the pipeline
    ///
    /// Relative URLs are resolved against `api.base_url`. A cache policy
    /// without a max age picks up `cache.default_max_age_ms`.
    ///
    /// # Errors
    /// Returns the classified [`AppError`] of the request.
    pub async fn execute(
        &self,
        mut descriptor: RequestDescriptor,
    ) -> std::result::Result<ApiResponse, AppError> {
        if !is_absolute(&descriptor.url) {
            descriptor.url = self.config.api.url(&descriptor.url);
        }
        if let Some(policy) = descriptor.cache_policy.as_mut() {
            policy.max_age = policy.max_age.or_else(|| self.config.cache.default_max_age());
        }
        self.pipeline.execute(descriptor).await
    }

    /// `GET path` and decode the JSON body
    ///
    /// # Errors
    /// Returns the request error, or `Unknown` if the body does not decode.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        cache_policy: Option<CachePolicy>,
    ) -> std::result::Result<T, AppError> {
        let mut descriptor = RequestDescriptor::get(path);
        descriptor.cache_policy = cache_policy;
        self.execute(descriptor).await?.json()
    }

    /// `POST path` with a JSON body and decode the JSON response
    ///
    /// # Errors
    /// Returns `Validation` if `body` cannot be serialized, otherwise as
    /// [`ApiClient::get_json`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)
            .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))?;
        self.execute(RequestDescriptor::post(path).with_body(body)).await?.json()
    }

    /// Store credentials obtained by the host's sign-in flow
    #[instrument(skip_all)]
    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        self.pipeline.coordinator().sign_in(credentials).await?;
        info!("session started");
        Ok(())
    }

    /// Destroy the session and drop every cached response
    ///
    /// Credentials and the re-authentication identity are cleared, and a
    /// token refresh still in flight is discarded.
    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<()> {
        self.pipeline.coordinator().sign_out().await?;
        let removed = self.pipeline.cache().store().clear().await?;
        info!(cache_entries_removed = removed, "session ended");
        Ok(())
    }

    /// Remove cached responses matching any rule; returns the number removed
    pub async fn invalidate_cache(&self, rules: &[CacheInvalidation]) -> Result<usize> {
        self.pipeline.cache().store().invalidate(rules).await
    }

    /// Remove expired cached responses; returns the number removed
    pub async fn purge_expired_cache(&self) -> Result<usize> {
        self.pipeline.cache().store().purge_expired().await
    }

    /// Receive [`SessionEvent::Invalidated`] when recovery fails
    pub fn subscribe_session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.pipeline.coordinator().subscribe()
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    config: TetherConfig,
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    identities: Option<Arc<dyn IdentityStore>>,
    backend: Option<Arc<dyn AuthBackend>>,
    connectivity: Option<Arc<dyn ConnectivityProbe>>,
    kv: Option<Arc<dyn DurableKv>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ApiClientBuilder {
    pub fn new(config: TetherConfig) -> Self {
        Self {
            config,
            transport: None,
            credentials: None,
            identities: None,
            backend: None,
            connectivity: None,
            kv: None,
            clock: None,
        }
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Enables fallback re-authentication
    #[must_use]
    pub fn identity_store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.identities = Some(store);
        self
    }

    #[must_use]
    pub fn auth_backend(mut self, backend: Arc<dyn AuthBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = Some(probe);
        self
    }

    #[must_use]
    pub fn kv(mut self, kv: Arc<dyn DurableKv>) -> Self {
        self.kv = Some(kv);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and assemble the pipeline
    ///
    /// # Errors
    /// Returns `TetherError::Config` for an invalid configuration, or the
    /// error of the first default adapter that fails to initialise.
    pub fn build(self) -> Result<ApiClient> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(default_transport(&config)?),
        };
        let credentials: Arc<dyn CredentialStore> = match self.credentials {
            Some(store) => store,
            None => Arc::new(KeychainCredentialStore::from_config(&config.auth)?),
        };
        let backend: Arc<dyn AuthBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(
                HttpAuthBackend::new(transport.clone(), &config.api, &config.auth)
                    .with_clock(clock.clone()),
            ),
        };
        let connectivity: Arc<dyn ConnectivityProbe> = match self.connectivity {
            Some(probe) => probe,
            None => Arc::new(HttpConnectivityProbe::from_config(&config.connectivity)?),
        };
        let kv: Arc<dyn DurableKv> = match (self.kv, config.cache.db_path.as_deref()) {
            (Some(kv), _) => kv,
            (None, Some(path)) => Arc::new(SqliteKv::open(path)?),
            (None, None) => Arc::new(MemoryKv::new()),
        };

        let mut coordinator = RefreshCoordinator::builder(credentials, backend)
            .clock(clock.clone())
            .refresh_threshold_secs(config.auth.refresh_threshold_secs);
        if let Some(identities) = self.identities {
            coordinator = coordinator.identity_store(identities);
        }

        let cache = CacheStrategyEngine::new(
            CacheStore::new(kv).with_clock(clock),
            connectivity.clone(),
        );
        let pipeline = RequestPipeline::new(transport, coordinator.build(), cache, connectivity)
            .with_settings(PipelineSettings::from_config(&config.api, &config.pipeline));

        info!(base_url = %config.api.base_url, "api client ready");

        Ok(ApiClient { pipeline, config: Arc::new(config) })
    }
}

fn default_transport(config: &TetherConfig) -> Result<ReqwestTransport> {
    let mut builder = ReqwestTransport::builder().timeout(config.api.timeout());
    if let Some(agent) = &config.api.user_agent {
        builder = builder.user_agent(agent.clone());
    }
    builder.build()
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("base_url", &self.config.api.base_url).finish()
    }
}
