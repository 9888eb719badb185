//! Convenience re-exports.

pub use crate::auth::{
    AuthError, CredentialStore, Credentials, LogoutHandler, RefreshCoordinator, TokenRefresher,
};
pub use crate::config::ClientConfig;
pub use crate::error::{ClientError, Result, TransportError};
pub use crate::http::{AuthenticatedClient, TokenAwareRequestExecutor};
pub use crate::pairing::{PairingSession, PairingSessionTimer};
pub use crate::provisioning::{
    ConnectionState, InstanceDraft, InstanceProvisioningOrchestrator, InstanceStatus,
    MessagingInstance, ProvisioningError, ProvisioningOutcome, ProvisioningPhase,
};
pub use crate::session::Session;
