use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh credential pair for the backend session.
///
/// # Example
/// ```
/// use waprov::auth::Credentials;
/// use chrono::{Duration, Utc};
///
/// let credentials = Credentials {
///     access_token: "access".to_string(),
///     refresh_token: Some("refresh".to_string()),
///     expires_at: Some(Utc::now() + Duration::minutes(15)),
/// };
/// assert!(!credentials.is_expired(Utc::now()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(rename = "token_expires")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: None,
        }
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the access token is past its advertised expiry.
    ///
    /// Credentials without an expiry are treated as valid until the backend
    /// answers 401.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    /// Time left before expiry, clamped at zero.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|exp| (exp - now).max(Duration::zero()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_without_expiry_never_expire() {
        let credentials = Credentials::new("access", None);
        assert!(!credentials.is_expired(Utc::now() + Duration::days(365)));
        assert!(credentials.expires_in(Utc::now()).is_none());
    }

    #[test]
    fn expires_in_is_clamped_at_zero() {
        let now = Utc::now();
        let credentials = Credentials::new("access", None).with_expires_at(now - Duration::minutes(1));
        assert!(credentials.is_expired(now));
        assert_eq!(credentials.expires_in(now), Some(Duration::zero()));
    }
}
