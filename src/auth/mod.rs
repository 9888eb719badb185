//! Credentials, their storage, and single-flight refresh.

pub mod credentials;
pub mod error;
pub mod logout;
pub mod refresh;
pub mod store;

pub use credentials::Credentials;
pub use error::AuthError;
pub use logout::{LogoutHandler, LogoutReason, LogoutTrigger, TracingLogoutHandler};
pub use refresh::{HttpTokenRefresher, RefreshCoordinator, RefreshSettings, TokenRefresher};
pub use store::{
    CredentialPersistence, CredentialStore, FileCredentialPersistence, NoPersistence,
};
