//! Wiring of the credential store, refresh coordinator, and backend client.

use std::sync::Arc;

use crate::auth::{
    CredentialStore, Credentials, FileCredentialPersistence, HttpTokenRefresher, LogoutHandler,
    RefreshCoordinator, RefreshSettings, TokenRefresher, TracingLogoutHandler,
};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{AuthenticatedClient, TokenAwareRequestExecutor};

/// One signed-in client: shared credentials, their single-flight refresh,
/// and the backend client that uses both.
#[derive(Debug, Clone)]
pub struct Session {
    coordinator: RefreshCoordinator,
    client: AuthenticatedClient,
}

impl Session {
    /// File-persisted credentials, HTTP refresh, and a logging logout handler.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::with_logout_handler(config, Arc::new(TracingLogoutHandler))
    }

    pub fn with_logout_handler(
        config: &ClientConfig,
        logout_handler: Arc<dyn LogoutHandler>,
    ) -> Result<Self> {
        let persistence = Arc::new(FileCredentialPersistence::new(config.credentials_dir()));
        let store = Arc::new(CredentialStore::load_persisted(persistence)?);
        let refresher = Arc::new(HttpTokenRefresher::new(config.refresh_url()));
        Ok(Self::assemble(config, store, refresher, logout_handler))
    }

    /// Build from explicit parts.
    pub fn assemble(
        config: &ClientConfig,
        store: Arc<CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        logout_handler: Arc<dyn LogoutHandler>,
    ) -> Self {
        let settings = RefreshSettings {
            timeout: config.refresh_timeout(),
            logout_delay: config.logout_delay(),
        };
        let coordinator = RefreshCoordinator::with_settings(store, refresher, logout_handler, settings);
        let executor = TokenAwareRequestExecutor::new(coordinator.clone());
        let client = AuthenticatedClient::new(config.backend_url(), executor);
        Self {
            coordinator,
            client,
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub fn executor(&self) -> &TokenAwareRequestExecutor {
        self.client.executor()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.coordinator.current()
    }

    pub fn sign_in(&self, credentials: Credentials) -> Result<()> {
        Ok(self.coordinator.sign_in(credentials)?)
    }

    pub fn logout(&self) -> Result<()> {
        Ok(self.coordinator.logout()?)
    }
}
