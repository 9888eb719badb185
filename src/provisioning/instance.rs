use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::error::ProvisioningError;
use crate::error::TransportError;
use crate::util::phone::normalize_phone_number;

/// Administrative status of an instance in the local registry.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum InstanceStatus {
    #[default]
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "inactive")]
    Inactive,
}

/// Link state between the instance and the messaging account.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ConnectionState {
    #[default]
    #[serde(alias = "disconnected", alias = "close")]
    Disconnected,
    #[serde(alias = "connecting")]
    Connecting,
    #[serde(alias = "scanning")]
    Scanning,
    #[serde(alias = "connected", alias = "open")]
    Connected,
    #[serde(alias = "failed")]
    Failed,
}

impl ConnectionState {
    /// Map the provider's session state (`open`, `close`, `connecting`).
    pub fn from_provider_state(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "open" => Self::Connected,
            "connecting" => Self::Connecting,
            "close" | "closed" => Self::Disconnected,
            other => other.parse().unwrap_or(Self::Failed),
        }
    }
}

/// QR image and pairing code used to link a messaging account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairingPayload {
    /// QR image as a base64 PNG, usually a `data:image/png;base64,` URL.
    pub qr_base64: Option<String>,
    pub pairing_code: Option<String>,
    /// Raw QR content.
    pub code: Option<String>,
}

impl PairingPayload {
    pub fn is_empty(&self) -> bool {
        self.qr_base64.is_none() && self.pairing_code.is_none() && self.code.is_none()
    }

    /// Decoded QR PNG bytes. Accepts a bare base64 string or a data URL.
    pub fn qr_png(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let Some(raw) = self.qr_base64.as_deref().filter(|raw| !raw.is_empty()) else {
            return Ok(None);
        };
        let encoded = match raw.split_once(";base64,") {
            Some((_, data)) => data,
            None => raw,
        };
        STANDARD
            .decode(encoded.trim())
            .map(Some)
            .map_err(|e| TransportError::Parse(format!("invalid QR image: {e}")))
    }
}

/// A provisioned messaging instance, reconciled across the provider and
/// the local registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagingInstance {
    pub local_id: String,
    pub external_instance_id: String,
    /// Name the provider knows the instance by; stable across resets.
    pub instance_name: String,
    /// Logical identity assigned at creation; never regenerated.
    pub instance_code: String,
    pub display_name: String,
    pub phone_number: String,
    pub status: InstanceStatus,
    pub connection_state: ConnectionState,
    /// Provider integration chosen at creation. Resets recreate with it;
    /// `None` for records that never stored one.
    #[serde(default)]
    pub integration: Option<String>,
    pub pairing_payload: Option<PairingPayload>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Caller input for creating an instance.
///
/// # Example
/// ```
/// use waprov::provisioning::InstanceDraft;
///
/// let draft = InstanceDraft::builder()
///     .display_name("Sede A".to_string())
///     .phone_number("+51 987 654 321".to_string())
///     .build();
/// let valid = draft.validate().unwrap();
/// assert_eq!(valid.instance_name, "SEDE_A");
/// assert_eq!(valid.phone_number, "51987654321");
/// ```
#[derive(Debug, Clone, Builder)]
pub struct InstanceDraft {
    pub display_name: String,
    pub phone_number: String,
    /// Provider integration; the orchestrator default applies when absent.
    pub integration: Option<String>,
}

/// An [`InstanceDraft`] that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDraft {
    pub display_name: String,
    pub instance_name: String,
    pub phone_number: String,
    pub integration: Option<String>,
}

impl InstanceDraft {
    pub fn validate(&self) -> Result<ValidatedDraft, ProvisioningError> {
        let display_name = self.display_name.trim();
        if display_name.is_empty() {
            return Err(ProvisioningError::InvalidInput(
                "display name must not be empty".to_string(),
            ));
        }
        let phone_number = normalize_phone_number(&self.phone_number).ok_or_else(|| {
            ProvisioningError::InvalidInput(format!(
                "invalid phone number: {}",
                self.phone_number
            ))
        })?;
        Ok(ValidatedDraft {
            display_name: display_name.to_string(),
            instance_name: instance_name_for(display_name),
            phone_number,
            integration: self.integration.clone(),
        })
    }
}

/// Provider-side name derived from a display name: upper-case, with runs
/// of anything but letters and digits collapsed to `_`.
pub fn instance_name_for(display_name: &str) -> String {
    let mut out = String::with_capacity(display_name.len());
    for ch in display_name.trim().chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_uppercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
