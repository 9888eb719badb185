use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::credentials::Credentials;
use super::error::AuthError;
use super::logout::{LogoutHandler, LogoutReason, LogoutTrigger};
use super::store::CredentialStore;
use crate::util::timeout::with_timeout;

/// Default bound on a single refresh exchange.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity-provider call that exchanges a refresh token for new credentials.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Returned credentials may omit the refresh token; the coordinator then
    /// keeps the one it sent.
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials, AuthError>;
}

/// [`TokenRefresher`] that POSTs `{"refresh_token": ...}` to a refresh endpoint.
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenRefresher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: crate::http::shared_client().clone(),
            url: url.into(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<Credentials, AuthError> {
        let resp = self
            .client
            .post(&self.url)
            .header("Accept", "application/json")
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::RefreshFailed(
                "refresh token rejected by identity provider".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(AuthError::RefreshFailed(format!(
                "refresh request failed with status {status}"
            )));
        }
        let body = resp.text().await?;
        let payload: RefreshResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::InvalidResponse(format!("refresh payload: {e}")))?;
        Ok(payload.into_credentials(Utc::now()))
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_expires: Option<DateTime<Utc>>,
}

impl RefreshResponse {
    fn into_credentials(self, now: DateTime<Utc>) -> Credentials {
        let expires_at = self
            .token_expires
            .or_else(|| self.expires_in.map(|secs| now + chrono::Duration::seconds(secs)));
        Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Result<Credentials, AuthError>>>;

/// Single-flight refresh of the session credentials.
///
/// Every caller that asks for fresh credentials while a refresh is running
/// awaits that same refresh and receives its outcome; only one request hits
/// the identity provider. A failed refresh clears the store and schedules
/// one logout, however many callers observed the failure.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use waprov::auth::{
///     CredentialStore, HttpTokenRefresher, RefreshCoordinator, TracingLogoutHandler,
/// };
///
/// # async fn example() -> Result<(), waprov::auth::AuthError> {
/// let coordinator = RefreshCoordinator::new(
///     Arc::new(CredentialStore::in_memory()),
///     Arc::new(HttpTokenRefresher::new("https://backend.example/api/auth/refresh")),
///     Arc::new(TracingLogoutHandler),
/// );
/// let fresh = coordinator.ensure_fresh_credentials().await?;
/// # let _ = fresh;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    logout: LogoutTrigger,
    timeout: Duration,
    generation: AtomicU64,
    in_flight: Mutex<Option<(u64, SharedRefresh)>>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("store", &self.inner.store)
            .field("timeout", &self.inner.timeout)
            .field("logout", &self.inner.logout)
            .finish()
    }
}

/// Tunables for [`RefreshCoordinator`].
#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    /// Bound on a single identity-provider exchange.
    pub timeout: Duration,
    /// Delay between a terminal failure and the logout handler running.
    pub logout_delay: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REFRESH_TIMEOUT,
            logout_delay: Duration::ZERO,
        }
    }
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        logout_handler: Arc<dyn LogoutHandler>,
    ) -> Self {
        Self::with_settings(store, refresher, logout_handler, RefreshSettings::default())
    }

    pub fn with_settings(
        store: Arc<CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        logout_handler: Arc<dyn LogoutHandler>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                refresher,
                logout: LogoutTrigger::new(logout_handler, settings.logout_delay),
                timeout: settings.timeout,
                generation: AtomicU64::new(0),
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// Snapshot of the current credentials.
    pub fn current(&self) -> Option<Credentials> {
        self.inner.store.get()
    }

    /// Install credentials obtained from a login and re-arm the logout trigger.
    pub fn sign_in(&self, credentials: Credentials) -> Result<(), AuthError> {
        self.inner.store.replace(credentials)?;
        self.inner.logout.rearm();
        info!("signed in");
        Ok(())
    }

    /// Clear credentials and schedule the logout action.
    ///
    /// A refresh still running at this point finishes with
    /// [`AuthError::SessionExpired`] and leaves the store empty.
    pub fn logout(&self) -> Result<(), AuthError> {
        let cleared = self.inner.store.clear();
        lock(&self.inner.in_flight).take();
        self.inner.logout.schedule(LogoutReason::Requested);
        cleared
    }

    /// Whether a logout has been scheduled since the last sign-in.
    pub fn is_logged_out(&self) -> bool {
        self.inner.logout.is_scheduled()
    }

    /// Exchange the refresh token for new credentials, sharing any refresh
    /// already in flight.
    pub async fn ensure_fresh_credentials(&self) -> Result<Credentials, AuthError> {
        let (generation, refresh) = self.join_or_start();
        let outcome = refresh.await;
        self.finish(generation);
        outcome
    }

    /// Fresh credentials for a caller whose request was rejected while using
    /// `rejected_access_token`.
    ///
    /// When the store already holds a different access token, some other
    /// caller refreshed in the meantime and those credentials are returned
    /// without contacting the identity provider.
    pub async fn refresh_after_rejection(
        &self,
        rejected_access_token: &str,
    ) -> Result<Credentials, AuthError> {
        if let Some(current) = self.inner.store.get() {
            if current.access_token != rejected_access_token {
                debug!("credentials already rotated, skipping refresh");
                return Ok(current);
            }
        }
        self.ensure_fresh_credentials().await
    }

    fn join_or_start(&self) -> (u64, SharedRefresh) {
        let mut slot = lock(&self.inner.in_flight);
        if let Some((generation, refresh)) = slot.as_ref() {
            debug!(generation, "joining in-flight refresh");
            return (*generation, refresh.clone());
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, "starting refresh");
        let inner = self.inner.clone();
        let refresh = async move { inner.run_refresh().await }.boxed().shared();
        *slot = Some((generation, refresh.clone()));
        (generation, refresh)
    }

    fn finish(&self, generation: u64) {
        let mut slot = lock(&self.inner.in_flight);
        if matches!(slot.as_ref(), Some((current, _)) if *current == generation) {
            *slot = None;
        }
    }
}

impl Inner {
    async fn run_refresh(self: Arc<Self>) -> Result<Credentials, AuthError> {
        let (current, epoch) = self.store.snapshot();
        let refresh_token = match current.and_then(|c| c.refresh_token) {
            Some(token) => token,
            None => {
                let err = AuthError::NoRefreshToken;
                self.end_session(epoch, &err);
                return Err(err);
            }
        };

        let timeout = self.timeout;
        let exchanged = with_timeout(timeout, self.refresher.refresh(&refresh_token), |ms| {
            AuthError::RefreshTimeout { timeout_ms: ms }
        })
        .await;

        let mut fresh = match exchanged {
            Ok(fresh) => fresh,
            Err(err) => {
                self.end_session(epoch, &err);
                return Err(err);
            }
        };
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = Some(refresh_token);
        }
        match self.store.replace_if_epoch(epoch, fresh.clone()) {
            Ok(true) => {
                info!(expires_at = ?fresh.expires_at, "credentials refreshed");
                Ok(fresh)
            }
            Ok(false) => {
                debug!(epoch, "session changed during refresh, discarding result");
                Err(AuthError::SessionExpired)
            }
            Err(err) => {
                self.end_session(epoch, &err);
                Err(err)
            }
        }
    }

    /// Terminal failure: clear the session the refresh started from and
    /// schedule the logout. A session signed in since then is left alone.
    fn end_session(&self, epoch: u64, err: &AuthError) {
        match self.store.clear_if_epoch(epoch) {
            Ok(false) => {
                debug!(epoch, error = %err, "refresh failed for a session that already ended");
                return;
            }
            Ok(true) => warn!(error = %err, "refresh failed, clearing session"),
            Err(clear_err) => warn!(
                error = %err,
                clear_error = %clear_err,
                "refresh failed, persisted credentials not cleared"
            ),
        }
        self.logout.schedule(LogoutReason::RefreshFailed(err.clone()));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
