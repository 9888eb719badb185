use std::future::Future;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::auth::{Credentials, RefreshCoordinator};
use crate::error::{ClientError, TransportError};

/// Outcome of one attempt, as seen by the executor.
enum Attempt {
    Completed(reqwest::Response),
    AuthExpired,
}

impl Attempt {
    fn classify(resp: reqwest::Response) -> Self {
        if resp.status() == StatusCode::UNAUTHORIZED {
            Self::AuthExpired
        } else {
            Self::Completed(resp)
        }
    }
}

/// Runs backend calls with the current credentials and recovers from an
/// expired session by refreshing once and retrying once.
///
/// Only a 401 triggers recovery. Any other status, business error, or
/// transport failure is returned as-is, and a retry that is rejected again
/// is returned to the caller instead of looping.
#[derive(Debug, Clone)]
pub struct TokenAwareRequestExecutor {
    coordinator: RefreshCoordinator,
}

impl TokenAwareRequestExecutor {
    pub fn new(coordinator: RefreshCoordinator) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Execute `request_fn`, which issues one HTTP call with the credentials
    /// it is given.
    ///
    /// Without any stored credentials the call is not attempted; the refresh
    /// path runs directly and reports why the session cannot continue.
    pub async fn execute<F, Fut>(&self, mut request_fn: F) -> Result<reqwest::Response, ClientError>
    where
        F: FnMut(Credentials) -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let credentials = match self.coordinator.current() {
            Some(credentials) => credentials,
            None => self.coordinator.ensure_fresh_credentials().await?,
        };
        let rejected_token = credentials.access_token.clone();

        let first = request_fn(credentials)
            .await
            .map_err(TransportError::from)?;
        match Attempt::classify(first) {
            Attempt::Completed(resp) => return Ok(resp),
            Attempt::AuthExpired => {
                debug!("request unauthorized, refreshing credentials");
            }
        }

        let fresh = self
            .coordinator
            .refresh_after_rejection(&rejected_token)
            .await?;

        let retried = request_fn(fresh).await.map_err(TransportError::from)?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!("request still unauthorized after refresh, giving up");
        }
        Ok(retried)
    }
}
