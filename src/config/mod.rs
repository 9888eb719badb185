//! Configuration (layered: code > env > defaults).

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::refresh::DEFAULT_REFRESH_TIMEOUT;
use crate::auth::store::default_waprov_dir;
use crate::error::{ClientError, Result};
use crate::pairing::PAIRING_WINDOW;
use crate::provisioning::external::DEFAULT_INTEGRATION;
use crate::provisioning::orchestrator::DEFAULT_RESET_GRACE;
use crate::provisioning::registry::DEFAULT_INSTANCES_PATH;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/api";
const DEFAULT_PROVIDER_URL: &str = "http://localhost:8080";
const DEFAULT_LOGOUT_DELAY: Duration = Duration::from_millis(1500);

/// Client configuration.
///
/// Resolution order for every field:
/// 1. Explicit `with_*` calls
/// 2. Environment variables (`.env` is loaded first when present)
/// 3. Built-in defaults
///
/// # Example
/// ```
/// use std::time::Duration;
/// use waprov::config::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_backend_url("https://admin.example/api")
///     .with_reset_grace(Duration::from_secs(5));
/// assert_eq!(config.refresh_url(), "https://admin.example/api/auth/refresh");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    backend_url: String,
    refresh_url: Option<String>,
    instances_path: String,
    provider_url: String,
    provider_api_key: Option<String>,
    integration: String,
    refresh_timeout: Duration,
    reset_grace: Duration,
    logout_delay: Duration,
    pairing_window: Duration,
    credentials_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            refresh_url: None,
            instances_path: DEFAULT_INSTANCES_PATH.to_string(),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            provider_api_key: None,
            integration: DEFAULT_INTEGRATION.to_string(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            reset_grace: DEFAULT_RESET_GRACE,
            logout_delay: DEFAULT_LOGOUT_DELAY,
            pairing_window: PAIRING_WINDOW,
            credentials_dir: default_waprov_dir(),
        }
    }
}

impl ClientConfig {
    /// Load from environment variables (`WAPROV_BACKEND_URL`, `WAPROV_PROVIDER_URL`, ...).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("WAPROV_BACKEND_URL") {
            config = config.with_backend_url(url);
        }
        if let Some(url) = lookup("WAPROV_REFRESH_URL") {
            config = config.with_refresh_url(url);
        }
        if let Some(path) = lookup("WAPROV_INSTANCES_PATH") {
            config.instances_path = path;
        }
        if let Some(url) = lookup("WAPROV_PROVIDER_URL") {
            config = config.with_provider_url(url);
        }
        if let Some(key) = lookup("WAPROV_PROVIDER_API_KEY").filter(|k| !k.is_empty()) {
            config.provider_api_key = Some(key);
        }
        if let Some(integration) = lookup("WAPROV_INTEGRATION") {
            config.integration = integration;
        }
        if let Some(dir) = lookup("WAPROV_HOME") {
            config.credentials_dir = PathBuf::from(dir);
        }

        let secs = |key: &str| -> Result<Option<Duration>> {
            lookup(key)
                .map(|raw| parse_u64(key, &raw).map(Duration::from_secs))
                .transpose()
        };
        if let Some(timeout) = secs("WAPROV_REFRESH_TIMEOUT_SECS")? {
            config.refresh_timeout = timeout;
        }
        if let Some(grace) = secs("WAPROV_RESET_GRACE_SECS")? {
            config.reset_grace = grace;
        }
        if let Some(raw) = lookup("WAPROV_LOGOUT_DELAY_MS") {
            config.logout_delay = Duration::from_millis(parse_u64("WAPROV_LOGOUT_DELAY_MS", &raw)?);
        }

        Ok(config)
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_refresh_url(mut self, url: impl Into<String>) -> Self {
        self.refresh_url = Some(url.into());
        self
    }

    pub fn with_instances_path(mut self, path: impl Into<String>) -> Self {
        self.instances_path = path.into();
        self
    }

    pub fn with_provider_url(mut self, url: impl Into<String>) -> Self {
        self.provider_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_provider_api_key(mut self, key: impl Into<String>) -> Self {
        self.provider_api_key = Some(key.into());
        self
    }

    pub fn with_integration(mut self, integration: impl Into<String>) -> Self {
        self.integration = integration.into();
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn with_reset_grace(mut self, grace: Duration) -> Self {
        self.reset_grace = grace;
        self
    }

    pub fn with_logout_delay(mut self, delay: Duration) -> Self {
        self.logout_delay = delay;
        self
    }

    pub fn with_pairing_window(mut self, window: Duration) -> Self {
        self.pairing_window = window;
        self
    }

    pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = dir.into();
        self
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Refresh endpoint; defaults to `{backend_url}/auth/refresh`.
    pub fn refresh_url(&self) -> String {
        self.refresh_url
            .clone()
            .unwrap_or_else(|| format!("{}/auth/refresh", self.backend_url))
    }

    pub fn instances_path(&self) -> &str {
        &self.instances_path
    }

    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    pub fn provider_api_key(&self) -> Option<String> {
        self.provider_api_key.clone()
    }

    pub fn integration(&self) -> &str {
        &self.integration
    }

    pub fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout
    }

    pub fn reset_grace(&self) -> Duration {
        self.reset_grace
    }

    pub fn logout_delay(&self) -> Duration {
        self.logout_delay
    }

    pub fn pairing_window(&self) -> Duration {
        self.pairing_window
    }

    pub fn credentials_dir(&self) -> &PathBuf {
        &self.credentials_dir
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim().parse().map_err(|_| {
        ClientError::Configuration(format!("{key} must be a whole number, got {raw:?}"))
    })
}
