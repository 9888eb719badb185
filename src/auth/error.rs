use thiserror::Error;

/// Authentication failures surfaced by the refresh path.
///
/// `Clone` so that a single refresh outcome can be delivered to every caller
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No refresh token available")]
    NoRefreshToken,
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("Token refresh timed out after {timeout_ms}ms")]
    RefreshTimeout { timeout_ms: u64 },
    #[error("Session expired")]
    SessionExpired,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::RefreshFailed(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
