//! Shared test helpers for `tether-core` integration tests.
//!
//! Lightweight mocks for the core ports so the scenario tests can focus on
//! behaviour instead of wiring.

#![allow(dead_code)]

pub mod auth;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tether_core::{
    CacheStore, CacheStrategyEngine, MemoryCredentialStore, MemoryIdentityStore, MemoryKv,
    PipelineSettings, RefreshCoordinator, RequestPipeline, ToggleConnectivity,
};
use tether_domain::Credentials;

pub use self::auth::MockAuthBackend;
pub use self::transport::MockTransport;

/// Everything a pipeline test needs to drive and inspect
pub struct Harness {
    pub pipeline: RequestPipeline,
    pub transport: Arc<MockTransport>,
    pub backend: Arc<MockAuthBackend>,
    pub credentials: MemoryCredentialStore,
    pub identities: MemoryIdentityStore,
    pub connectivity: Arc<ToggleConnectivity>,
    pub kv: MemoryKv,
}

impl Harness {
    pub fn new(transport: MockTransport, backend: MockAuthBackend) -> Self {
        Self::with_settings(transport, backend, PipelineSettings::default())
    }

    pub fn with_settings(
        transport: MockTransport,
        backend: MockAuthBackend,
        settings: PipelineSettings,
    ) -> Self {
        let transport = Arc::new(transport);
        let backend = Arc::new(backend);
        let credentials = MemoryCredentialStore::new();
        let identities = MemoryIdentityStore::default();
        let connectivity = Arc::new(ToggleConnectivity::new(true));
        let kv = MemoryKv::new();

        let coordinator =
            RefreshCoordinator::builder(Arc::new(credentials.clone()), backend.clone())
                .identity_store(Arc::new(identities.clone()))
                .build();
        let engine =
            CacheStrategyEngine::new(CacheStore::new(Arc::new(kv.clone())), connectivity.clone());
        let pipeline =
            RequestPipeline::new(transport.clone(), coordinator, engine, connectivity.clone())
                .with_settings(settings);

        Self { pipeline, transport, backend, credentials, identities, connectivity, kv }
    }

    /// Store a credential pair as if the user had just signed in
    pub fn sign_in(&self, access_token: &str, refresh_token: &str) {
        self.credentials.set(Some(creds(access_token, refresh_token)));
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        self.pipeline.coordinator()
    }
}

/// Credential pair built from non-empty literals
pub fn creds(access_token: &str, refresh_token: &str) -> Credentials {
    Credentials::new(access_token, refresh_token).unwrap()
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
