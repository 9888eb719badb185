//! Error types for Waprov.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::auth::AuthError;
use crate::provisioning::ProvisioningError;

/// Network or payload failures unrelated to authentication.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Parse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

/// Primary error type for all Waprov operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.into())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        Self::Transport(error.into())
    }
}

impl ClientError {
    /// Create an API error from a status code and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth(_) => ErrorCategory::Authentication,
            Self::Transport(TransportError::Network(_)) => ErrorCategory::Network,
            Self::Transport(TransportError::Parse(_)) => ErrorCategory::Serialization,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Provisioning(_) => ErrorCategory::Provisioning,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        if let Self::Provisioning(err) = self {
            return match err {
                ProvisioningError::InvalidInput(_) => RecoverySuggestion::CheckConfiguration,
                err if err.needs_manual_recovery() => RecoverySuggestion::ManualRecovery,
                _ => RecoverySuggestion::RetryLater,
            };
        }
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::SignInAgain,
            ErrorCategory::Network | ErrorCategory::Server => RecoverySuggestion::RetryLater,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::{ProvisioningFailure, ProvisioningPhase};

    #[test]
    fn api_status_maps_to_category() {
        assert_eq!(
            ClientError::api(401, "nope").category(),
            ErrorCategory::Authentication
        );
        assert_eq!(ClientError::api(503, "down").category(), ErrorCategory::Server);
        assert_eq!(ClientError::api(422, "bad").category(), ErrorCategory::Api);
    }

    #[test]
    fn auth_errors_suggest_signing_in_again() {
        let err = ClientError::from(AuthError::NoRefreshToken);
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::SignInAgain);
    }

    #[test]
    fn stale_local_state_suggests_manual_recovery() {
        let err = ClientError::from(ProvisioningError::LocalUpdateFailed(ProvisioningFailure {
            phase: ProvisioningPhase::LocalUpdate,
            instance_name: "SEDE_A".to_string(),
            external_instance_id: Some("ext-2".to_string()),
            local_id: Some("loc-1".to_string()),
            status: Some(500),
            cause: "HTTP error 500".to_string(),
        }));
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::ManualRecovery);
    }

    #[test]
    fn aborted_delete_suggests_retry() {
        let err = ClientError::from(ProvisioningError::ExternalDeleteFailed(ProvisioningFailure {
            phase: ProvisioningPhase::ExternalDelete,
            instance_name: "SEDE_A".to_string(),
            external_instance_id: Some("ext-1".to_string()),
            local_id: Some("loc-1".to_string()),
            status: Some(500),
            cause: "HTTP error 500".to_string(),
        }));
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::RetryLater);
    }
}
