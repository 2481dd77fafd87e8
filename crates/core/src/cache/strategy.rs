//! Cache strategy engine
//!
//! Arbitrates between [`CacheStore`] and a network fetch under one of five
//! [`CacheStrategy`] policies. Connectivity is probed once per call, only 2xx
//! responses are written, and cache I/O errors never fail a request: reads
//! degrade to a miss and failed writes are logged.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tether_domain::{ApiResponse, AppError, CacheEntry, CachePolicy, CacheStrategy};
use tracing::{debug, info_span, instrument, warn, Instrument};

use super::key::CacheKey;
use super::store::CacheStore;
use crate::http::ports::ConnectivityProbe;

/// Cache strategy engine
#[derive(Clone)]
pub struct CacheStrategyEngine {
    store: CacheStore,
    connectivity: Arc<dyn ConnectivityProbe>,
}

impl CacheStrategyEngine {
    pub fn new(store: CacheStore, connectivity: Arc<dyn ConnectivityProbe>) -> Self {
        Self { store, connectivity }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Produce a response for `key` under `policy`
    ///
    /// `fetch` performs the network call and must map non-2xx responses to
    /// errors. It is `'static` because stale-while-revalidate runs it in a
    /// background task after the cached value has been returned.
    ///
    /// # Errors
    /// - `Network` when offline and no usable cache entry exists
    /// - `Network` ("No cached data available") for a cache-only miss
    /// - the fetch error when the network was tried and no fallback applies
    #[instrument(skip_all, fields(key = %key, strategy = ?policy.strategy))]
    pub async fn resolve<F, Fut>(
        &self,
        key: &CacheKey,
        policy: CachePolicy,
        fetch: F,
    ) -> Result<ApiResponse, AppError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ApiResponse, AppError>> + Send + 'static,
    {
        let online = self.connectivity.is_online().await;

        match policy.strategy {
            CacheStrategy::NetworkOnly => {
                if !online {
                    return Err(AppError::offline());
                }
                let response = fetch().await?;
                store_response(&self.store, key, &response, policy.max_age).await;
                Ok(response)
            }
            CacheStrategy::CacheFirst => match self.cached(key).await {
                Some(hit) => Ok(hit),
                None => self.fetch_and_store(key, policy, online, fetch).await,
            },
            CacheStrategy::NetworkFirst => {
                if !online {
                    return self.cached(key).await.ok_or_else(AppError::offline);
                }
                match fetch().await {
                    Ok(response) => {
                        store_response(&self.store, key, &response, policy.max_age).await;
                        Ok(response)
                    }
                    Err(err) => match self.cached(key).await {
                        Some(hit) => {
                            debug!(error = %err, "network failed; serving cached response");
                            Ok(hit)
                        }
                        None => Err(err),
                    },
                }
            }
            CacheStrategy::CacheOnly => self.cached(key).await.ok_or_else(AppError::no_cached_data),
            CacheStrategy::StaleWhileRevalidate => match self.cached(key).await {
                Some(hit) => {
                    if online {
                        self.revalidate(key.clone(), policy.max_age, fetch);
                    }
                    Ok(hit)
                }
                None => self.fetch_and_store(key, policy, online, fetch).await,
            },
        }
    }

    async fn fetch_and_store<F, Fut>(
        &self,
        key: &CacheKey,
        policy: CachePolicy,
        online: bool,
        fetch: F,
    ) -> Result<ApiResponse, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ApiResponse, AppError>>,
    {
        if !online {
            return Err(AppError::offline());
        }
        let response = fetch().await?;
        store_response(&self.store, key, &response, policy.max_age).await;
        Ok(response)
    }

    async fn cached(&self, key: &CacheKey) -> Option<ApiResponse> {
        match self.store.get(key.as_str()).await {
            Ok(entry) => entry.map(|entry| entry.to_response()),
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed; treating as miss");
                None
            }
        }
    }

    fn revalidate<F, Fut>(&self, key: CacheKey, max_age: Option<Duration>, fetch: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ApiResponse, AppError>> + Send + 'static,
    {
        let store = self.store.clone();
        let span = info_span!("cache_revalidate", key = %key);

        tokio::spawn(
            async move {
                match fetch().await {
                    Ok(response) => {
                        store_response(&store, &key, &response, max_age).await;
                        debug!("background revalidation stored fresh response");
                    }
                    Err(err) => warn!(error = %err, "background revalidation failed"),
                }
            }
            .instrument(span),
        );
    }
}

async fn store_response(
    store: &CacheStore,
    key: &CacheKey,
    response: &ApiResponse,
    max_age: Option<Duration>,
) {
    if !response.is_success() {
        return;
    }

    let entry = CacheEntry::from_response(key.as_str(), response, store.now_millis(), max_age);
    if let Err(err) = store.put(&entry).await {
        warn!(key = %key, error = %err, "cache write failed");
    }
}
