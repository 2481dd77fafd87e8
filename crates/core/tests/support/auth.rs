//! Counting, scriptable and optionally gated auth backend

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tether_core::AuthBackend;
use tether_domain::{AppError, Credentials, Identity};
use tokio::sync::Semaphore;

type Script = Mutex<VecDeque<Result<Credentials, AppError>>>;

/// Auth backend answering from per-operation scripts
///
/// An exhausted script answers with an `Auth` error. When gated, every call
/// waits for a permit released by [`MockAuthBackend::release`].
#[derive(Default)]
pub struct MockAuthBackend {
    refresh_script: Script,
    reauth_script: Script,
    refresh_calls: AtomicUsize,
    reauth_calls: AtomicUsize,
    refresh_tokens: Mutex<Vec<String>>,
    identities: Mutex<Vec<Identity>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockAuthBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_returns(self, result: Result<Credentials, AppError>) -> Self {
        self.refresh_script.lock().unwrap().push_back(result);
        self
    }

    pub fn reauth_returns(self, result: Result<Credentials, AppError>) -> Self {
        self.reauth_script.lock().unwrap().push_back(result);
        self
    }

    /// Hold every call until [`Self::release`] hands out a permit
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `calls` gated calls proceed
    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn reauth_calls(&self) -> usize {
        self.reauth_calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented, in call order
    pub fn refresh_tokens(&self) -> Vec<String> {
        self.refresh_tokens.lock().unwrap().clone()
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.identities.lock().unwrap().clone()
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
    }

    fn next(script: &Script, operation: &str) -> Result<Credentials, AppError> {
        script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::auth(format!("{operation} rejected"))))
    }
}

#[async_trait]
impl AuthBackend for MockAuthBackend {
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials, AppError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_tokens.lock().unwrap().push(refresh_token.to_string());
        self.pass_gate().await;
        Self::next(&self.refresh_script, "refresh")
    }

    async fn reauthenticate(&self, identity: &Identity) -> Result<Credentials, AppError> {
        self.reauth_calls.fetch_add(1, Ordering::SeqCst);
        self.identities.lock().unwrap().push(identity.clone());
        self.pass_gate().await;
        Self::next(&self.reauth_script, "re-authentication")
    }
}
