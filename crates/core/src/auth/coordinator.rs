//! Single-flight access-token refresh
//!
//! The coordinator is a two-state machine:
//!
//! ```text
//!   Idle ──refresh()──▶ Refreshing { waiters } ──settle──▶ Idle
//!                          ▲        │
//!                          └─join───┘
//! ```
//!
//! The first caller that needs a new token starts a refresh cycle on a
//! spawned task; every caller, including the first, parks a oneshot sender
//! in the waiter list. When the cycle finishes, the waiter list is taken and
//! every sender receives the same outcome while the state lock is held, so a
//! caller can only ever observe the cycle it joined.
//!
//! A cycle tries `AuthBackend::refresh` with the stored refresh token, then
//! falls back to `AuthBackend::reauthenticate` with a validated stored
//! identity. If both fail, local credentials are cleared and
//! [`SessionEvent::Invalidated`] is broadcast.
//!
//! Sign-in and sign-out advance a session epoch. A cycle remembers the epoch
//! it started in and discards its outcome if the epoch moved on, so a refresh
//! that finishes after logout never stores credentials again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tether_common::time::{Clock, SystemClock};
use tether_domain::constants::DEFAULT_REFRESH_THRESHOLD_SECS;
use tether_domain::{AppError, Credentials, Identity, SessionEvent};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};

use super::ports::{AuthBackend, CredentialStore, IdentityStore};

type RefreshResult = Result<String, AppError>;

const SESSION_EVENT_CAPACITY: usize = 16;

enum RefreshState {
    Idle,
    Refreshing { waiters: Vec<oneshot::Sender<RefreshResult>> },
}

struct Inner {
    credentials: Arc<dyn CredentialStore>,
    backend: Arc<dyn AuthBackend>,
    identities: Option<Arc<dyn IdentityStore>>,
    clock: Arc<dyn Clock>,
    refresh_threshold_secs: i64,
    state: Mutex<RefreshState>,
    events: broadcast::Sender<SessionEvent>,
    session_epoch: AtomicU64,
    /// Serializes credential-store updates with sign-in and sign-out
    session_lock: tokio::sync::Mutex<()>,
}

/// Cloneable handle to the refresh state machine
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

/// Builder for [`RefreshCoordinator`]
pub struct RefreshCoordinatorBuilder {
    credentials: Arc<dyn CredentialStore>,
    backend: Arc<dyn AuthBackend>,
    identities: Option<Arc<dyn IdentityStore>>,
    clock: Arc<dyn Clock>,
    refresh_threshold_secs: i64,
}

impl RefreshCoordinatorBuilder {
    /// Enable fallback re-authentication with identities from `store`
    #[must_use]
    pub fn identity_store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.identities = Some(store);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Treat tokens expiring within `secs` as already expired
    #[must_use]
    pub fn refresh_threshold_secs(mut self, secs: i64) -> Self {
        self.refresh_threshold_secs = secs.max(0);
        self
    }

    pub fn build(self) -> RefreshCoordinator {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        RefreshCoordinator {
            inner: Arc::new(Inner {
                credentials: self.credentials,
                backend: self.backend,
                identities: self.identities,
                clock: self.clock,
                refresh_threshold_secs: self.refresh_threshold_secs,
                state: Mutex::new(RefreshState::Idle),
                events,
                session_epoch: AtomicU64::new(0),
                session_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

impl RefreshCoordinator {
    pub fn builder(
        credentials: Arc<dyn CredentialStore>,
        backend: Arc<dyn AuthBackend>,
    ) -> RefreshCoordinatorBuilder {
        RefreshCoordinatorBuilder {
            credentials,
            backend,
            identities: None,
            clock: Arc::new(SystemClock),
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
        }
    }

    /// Coordinator without re-authentication fallback
    pub fn new(credentials: Arc<dyn CredentialStore>, backend: Arc<dyn AuthBackend>) -> Self {
        Self::builder(credentials, backend).build()
    }

    /// Return a usable access token
    ///
    /// Without `force`, a stored token that is not known to be expired is
    /// returned as is. Otherwise the caller starts or joins a refresh cycle.
    ///
    /// # Errors
    /// `Auth` if there is no session to refresh or the cycle failed.
    pub async fn ensure_fresh_token(&self, force: bool) -> RefreshResult {
        let stored = self.read_credentials().await?;

        if !force {
            if let Some(credentials) = stored.as_ref().filter(|c| !self.is_expired(c)) {
                return Ok(credentials.access_token().to_string());
            }
        }

        self.refresh_session(stored.is_some()).await
    }

    /// Obtain a replacement for a token the server rejected with 401
    ///
    /// If the store already holds a different, unexpired token (a concurrent
    /// request refreshed first) it is returned without a new cycle.
    ///
    /// # Errors
    /// `Auth` if there is no session to refresh or the cycle failed.
    pub async fn recover_from_rejection(&self, rejected_token: Option<&str>) -> RefreshResult {
        let stored = self.read_credentials().await?;

        if let Some(credentials) = &stored {
            let token = credentials.access_token();
            if Some(token) != rejected_token && !self.is_expired(credentials) {
                debug!("token already replaced by a concurrent refresh");
                return Ok(token.to_string());
            }
        }

        self.refresh_session(stored.is_some()).await
    }

    /// Stored access token, refreshed first when known to be expired
    ///
    /// Returns `Ok(None)` when the user is not signed in.
    ///
    /// # Errors
    /// `Auth` if the token was expired and could not be refreshed.
    pub async fn current_token(&self) -> Result<Option<String>, AppError> {
        match self.read_credentials().await? {
            None => Ok(None),
            Some(credentials) if self.is_expired(&credentials) => {
                debug!("access token expired; refreshing before send");
                self.refresh_session(true).await.map(Some)
            }
            Some(credentials) => Ok(Some(credentials.access_token().to_string())),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of callers parked on the in-flight cycle
    pub fn pending_waiters(&self) -> usize {
        match &*self.inner.state.lock() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Start a new session with credentials from the host's sign-in flow
    ///
    /// A refresh cycle still in flight belongs to the previous session and
    /// will not overwrite these credentials.
    ///
    /// # Errors
    /// Returns the credential store's error.
    pub async fn sign_in(&self, credentials: &Credentials) -> tether_domain::Result<()> {
        let _session = self.inner.session_lock.lock().await;
        self.advance_epoch();
        self.inner.credentials.write(credentials).await
    }

    /// End the session
    ///
    /// Credentials and the stored identity are cleared. A cycle in flight
    /// stores nothing and its waiters receive an `Auth` error. No
    /// [`SessionEvent`] is broadcast for a deliberate sign-out.
    ///
    /// # Errors
    /// Returns the first store error; the credentials are cleared regardless.
    pub async fn sign_out(&self) -> tether_domain::Result<()> {
        let _session = self.inner.session_lock.lock().await;
        self.advance_epoch();

        let identity = match &self.inner.identities {
            Some(store) => store.clear_identity().await,
            None => Ok(()),
        };
        self.inner.credentials.clear().await?;
        identity
    }

    fn advance_epoch(&self) {
        // Under the state lock so a cycle starting now sees the new epoch
        let _state = self.inner.state.lock();
        self.inner.session_epoch.fetch_add(1, Ordering::SeqCst);
    }

    async fn read_credentials(&self) -> Result<Option<Credentials>, AppError> {
        self.inner.credentials.read().await.map_err(AppError::from)
    }

    fn is_expired(&self, credentials: &Credentials) -> bool {
        credentials.is_expired(self.inner.clock.now_utc(), self.inner.refresh_threshold_secs)
    }

    /// Join or start a cycle, unless there is nothing that could succeed
    async fn refresh_session(&self, has_credentials: bool) -> RefreshResult {
        let joinable = has_credentials || self.is_refreshing();
        if !joinable && read_valid_identity(&self.inner).await.is_none() {
            return Err(AppError::auth("Not authenticated"));
        }
        self.join_or_start_cycle().await
    }

    async fn join_or_start_cycle(&self) -> RefreshResult {
        let (tx, rx) = oneshot::channel();

        {
            let mut state = self.inner.state.lock();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    waiters.push(tx);
                    debug!(waiters = waiters.len(), "joined in-flight token refresh");
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing { waiters: vec![tx] };
                    let epoch = self.inner.session_epoch.load(Ordering::SeqCst);
                    debug!(epoch, "starting token refresh cycle");
                    tokio::spawn(run_cycle(Arc::clone(&self.inner), epoch));
                }
            }
        }

        rx.await.unwrap_or_else(|_| Err(AppError::unknown("Token refresh was interrupted")))
    }
}

async fn run_cycle(inner: Arc<Inner>, epoch: u64) {
    let outcome = obtain_credentials(&inner).await;

    let result = {
        let _session = inner.session_lock.lock().await;
        if inner.session_epoch.load(Ordering::SeqCst) != epoch {
            debug!(epoch, "session ended during refresh; discarding outcome");
            Err(AppError::auth("Session ended during token refresh"))
        } else {
            match outcome {
                Ok(credentials) => match inner.credentials.write(&credentials).await {
                    Ok(()) => Ok(credentials.access_token().to_string()),
                    Err(err) => {
                        error!(error = %err, "failed to persist refreshed credentials");
                        Err(AppError::from(err))
                    }
                },
                Err(err) => {
                    invalidate_session(&inner, &err.message).await;
                    Err(AppError::auth(format!("Session expired: {}", err.message)))
                }
            }
        }
    };

    settle(&inner, &result);
}

async fn obtain_credentials(inner: &Inner) -> Result<Credentials, AppError> {
    let stored = inner.credentials.read().await.unwrap_or_else(|err| {
        warn!(error = %err, "credential store unreadable during refresh");
        None
    });

    let refresh_error = match stored {
        Some(credentials) => match inner.backend.refresh(credentials.refresh_token()).await {
            Ok(fresh) => {
                info!("access token refreshed");
                return Ok(fresh);
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                err
            }
        },
        None => AppError::auth("No refresh token available"),
    };

    let Some(identity) = read_identity(inner).await else {
        return Err(refresh_error);
    };
    if let Err(err) = identity.validate() {
        warn!(error = %err, "stored identity cannot be used for re-authentication");
        return Err(refresh_error);
    }

    match inner.backend.reauthenticate(&identity).await {
        Ok(fresh) => {
            info!(login_method = ?identity.login_method, "re-authenticated after refresh failure");
            Ok(fresh)
        }
        Err(err) => {
            warn!(error = %err, "re-authentication failed");
            Err(err)
        }
    }
}

async fn read_identity(inner: &Inner) -> Option<Identity> {
    let store = inner.identities.as_ref()?;
    store.read_identity().await.unwrap_or_else(|err| {
        warn!(error = %err, "identity store unreadable");
        None
    })
}

async fn read_valid_identity(inner: &Inner) -> Option<Identity> {
    read_identity(inner).await.filter(|identity| identity.validate().is_ok())
}

async fn invalidate_session(inner: &Inner, reason: &str) {
    if let Err(err) = inner.credentials.clear().await {
        error!(error = %err, "failed to clear credentials after session loss");
    }
    error!(reason, "session invalidated");
    // No subscribers is not an error
    let _ = inner.events.send(SessionEvent::Invalidated { reason: reason.to_string() });
}

fn settle(inner: &Inner, result: &RefreshResult) {
    let mut state = inner.state.lock();
    let RefreshState::Refreshing { waiters } = std::mem::replace(&mut *state, RefreshState::Idle)
    else {
        return;
    };

    debug!(waiters = waiters.len(), success = result.is_ok(), "refresh cycle settled");
    for waiter in waiters {
        // The caller may have stopped waiting
        let _ = waiter.send(result.clone());
    }
}
