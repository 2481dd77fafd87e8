//! Manually toggled connectivity flag
//!
//! Used when the host application tracks reachability itself (OS network
//! callbacks) and in tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::info;

use super::ports::ConnectivityProbe;

#[derive(Debug)]
pub struct ToggleConnectivity {
    online: AtomicBool,
}

impl ToggleConnectivity {
    pub fn new(online: bool) -> Self {
        Self { online: AtomicBool::new(online) }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            info!(online, "connectivity changed");
        }
    }
}

impl Default for ToggleConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConnectivityProbe for ToggleConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
