//! Reachability probe over HTTP

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use tether_core::ConnectivityProbe;
use tether_domain::{ConnectivityConfig, TetherError};
use tracing::debug;

use crate::errors::InfraError;

/// Sends `HEAD probe_url` and reports online when any response arrives
///
/// Without a probe URL the device is assumed to be online; the pipeline then
/// learns about connectivity problems from the transport itself.
#[derive(Clone)]
pub struct HttpConnectivityProbe {
    client: ReqwestClient,
    probe_url: Option<String>,
}

impl HttpConnectivityProbe {
    pub fn new(probe_url: Option<String>, timeout: Duration) -> Result<Self, TetherError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|err| TetherError::from(InfraError::from(err)))?;

        Ok(Self { client, probe_url })
    }

    pub fn from_config(config: &ConnectivityConfig) -> Result<Self, TetherError> {
        Self::new(config.probe_url.clone(), Duration::from_millis(config.probe_timeout_ms))
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn is_online(&self) -> bool {
        let Some(url) = &self.probe_url else {
            return true;
        };

        match self.client.head(url).send().await {
            Ok(_) => true,
            Err(err) => {
                debug!(url = %url, error = %err, "connectivity probe failed");
                false
            }
        }
    }
}
