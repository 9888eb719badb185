use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::external::ExternalInstance;
use super::instance::{ConnectionState, InstanceStatus, PairingPayload};
use crate::error::Result;
use crate::http::AuthenticatedClient;

/// Default registry path under the backend base URL.
pub const DEFAULT_INSTANCES_PATH: &str = "notifications/whatsapp/instances";

/// Instance as stored by the local registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub instance_name: String,
    /// External instance id, when the registry mirrors it.
    #[serde(default, alias = "instanceId")]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub instance_code: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub status: InstanceStatus,
    #[serde(default)]
    pub connection_status: ConnectionState,
    /// Provider integration the instance was created with.
    #[serde(default)]
    pub integration: Option<String>,
    #[serde(default)]
    pub base64: Option<String>,
    #[serde(default)]
    pub pairing_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RegistryRecord {
    /// Pairing payload mirrored in the registry, if any.
    pub fn pairing_payload(&self) -> Option<PairingPayload> {
        let payload = PairingPayload {
            qr_base64: self.base64.clone(),
            pairing_code: self.pairing_code.clone(),
            code: None,
        };
        (!payload.is_empty()).then_some(payload)
    }

    /// Record as it stands after `payload` was written under `local_id`,
    /// for registries that acknowledge an update without a body.
    pub fn from_payload(local_id: &str, payload: &RegistryPayload) -> Self {
        let qrcode = payload.qrcode.as_ref();
        Self {
            id: local_id.to_string(),
            instance_name: payload.instance.instance_name.clone(),
            instance_id: Some(payload.instance.instance_id.clone()),
            instance_code: payload.instance_code.clone(),
            display_name: Some(payload.display_name.clone()),
            phone_number: payload.phone_number.clone(),
            status: payload.status,
            connection_status: payload.connection_status,
            integration: Some(payload.integration.clone()),
            base64: qrcode.and_then(|qr| qr.base64.clone()),
            pairing_code: qrcode.and_then(|qr| qr.pairing_code.clone()),
            created_at: None,
            updated_at: Some(Utc::now()),
        }
    }
}

/// Provider instance reference inside a [`RegistryPayload`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRef {
    pub instance_id: String,
    pub instance_name: String,
}

/// QR block inside a [`RegistryPayload`], in the provider's shape.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeEnvelope {
    pub base64: Option<String>,
    pub pairing_code: Option<String>,
    pub code: Option<String>,
}

/// Body sent to the registry on create and on update: the provider result
/// plus the local fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegistryPayload {
    pub instance: ExternalRef,
    pub qrcode: Option<QrCodeEnvelope>,
    pub hash: Option<serde_json::Value>,
    pub instance_code: String,
    pub display_name: String,
    pub phone_number: String,
    pub status: InstanceStatus,
    pub connection_status: ConnectionState,
    pub integration: String,
}

impl RegistryPayload {
    pub fn new(
        external: &ExternalInstance,
        instance_code: &str,
        display_name: &str,
        phone_number: &str,
        integration: &str,
        status: InstanceStatus,
    ) -> Self {
        Self {
            instance: ExternalRef {
                instance_id: external.instance_id.clone(),
                instance_name: external.instance_name.clone(),
            },
            qrcode: external.pairing.as_ref().map(|pairing| QrCodeEnvelope {
                base64: pairing.qr_base64.clone(),
                pairing_code: pairing.pairing_code.clone(),
                code: pairing.code.clone(),
            }),
            hash: external.hash.clone(),
            instance_code: instance_code.to_string(),
            display_name: display_name.to_string(),
            phone_number: phone_number.to_string(),
            status,
            connection_status: ConnectionState::Scanning,
            integration: integration.to_string(),
        }
    }
}

/// Local system of record for instances.
#[async_trait]
pub trait InstanceRegistry: Send + Sync {
    async fn register(&self, payload: &RegistryPayload) -> Result<RegistryRecord>;
    async fn update(&self, local_id: &str, payload: &RegistryPayload) -> Result<RegistryRecord>;
    async fn list(&self) -> Result<Vec<RegistryRecord>>;
    async fn get(&self, local_id: &str) -> Result<RegistryRecord>;
}

/// [`InstanceRegistry`] backed by the authenticated backend API.
#[derive(Debug, Clone)]
pub struct HttpInstanceRegistry {
    client: AuthenticatedClient,
    path: String,
}

impl HttpInstanceRegistry {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self::with_path(client, DEFAULT_INSTANCES_PATH)
    }

    pub fn with_path(client: AuthenticatedClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into().trim_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    instance: RegistryRecord,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    Wrapped { instances: Vec<RegistryRecord> },
    Bare(Vec<RegistryRecord>),
}

#[async_trait]
impl InstanceRegistry for HttpInstanceRegistry {
    async fn register(&self, payload: &RegistryPayload) -> Result<RegistryRecord> {
        let envelope: RecordEnvelope = self
            .client
            .post_json(&format!("{}/create", self.path), payload)
            .await?;
        Ok(envelope.instance)
    }

    async fn update(&self, local_id: &str, payload: &RegistryPayload) -> Result<RegistryRecord> {
        let envelope: Option<RecordEnvelope> = self
            .client
            .put_json_optional(&format!("{}/{local_id}", self.path), payload)
            .await?;
        Ok(match envelope {
            Some(envelope) => envelope.instance,
            None => {
                tracing::debug!(local_id, "registry update returned no body");
                RegistryRecord::from_payload(local_id, payload)
            }
        })
    }

    async fn list(&self) -> Result<Vec<RegistryRecord>> {
        let envelope: ListEnvelope = self.client.get_json(&self.path).await?;
        Ok(match envelope {
            ListEnvelope::Wrapped { instances } => instances,
            ListEnvelope::Bare(instances) => instances,
        })
    }

    async fn get(&self, local_id: &str) -> Result<RegistryRecord> {
        let envelope: RecordEnvelope = self
            .client
            .get_json(&format!("{}/{local_id}", self.path))
            .await?;
        Ok(envelope.instance)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| parse_timestamp(&value)))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accepts_numeric_id_and_naive_timestamps() {
        let record: RegistryRecord = serde_json::from_value(serde_json::json!({
            "id": 42,
            "instance_name": "SEDE_A",
            "instance_code": "ABCD-1234",
            "phone_number": "51987654321",
            "status": "ACTIVE",
            "connection_status": "SCANNING",
            "base64": "data:image/png;base64,AAAA",
            "created_at": "2024-05-01T10:00:00.123456",
            "updated_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.connection_status, ConnectionState::Scanning);
        assert!(record.created_at.is_some());
        assert!(record.updated_at.is_some());
        assert_eq!(
            record.pairing_payload().and_then(|p| p.qr_base64).as_deref(),
            Some("data:image/png;base64,AAAA")
        );
    }

    #[test]
    fn record_tolerates_missing_optional_fields() {
        let record: RegistryRecord = serde_json::from_value(serde_json::json!({
            "id": "loc-1",
            "instance_name": "SEDE_A",
            "created_at": null
        }))
        .unwrap();
        assert_eq!(record.status, InstanceStatus::Active);
        assert_eq!(record.connection_status, ConnectionState::Disconnected);
        assert!(record.pairing_payload().is_none());
        assert!(record.created_at.is_none());
    }

    #[test]
    fn list_envelope_accepts_both_shapes() {
        let wrapped: ListEnvelope = serde_json::from_value(serde_json::json!({
            "instances": [{ "id": "loc-1", "instance_name": "SEDE_A" }]
        }))
        .unwrap();
        assert!(matches!(wrapped, ListEnvelope::Wrapped { ref instances } if instances.len() == 1));

        let bare: ListEnvelope = serde_json::from_value(serde_json::json!([
            { "id": "loc-1", "instance_name": "SEDE_A" },
            { "id": 2, "instance_name": "SEDE_B" }
        ]))
        .unwrap();
        assert!(matches!(bare, ListEnvelope::Bare(ref instances) if instances.len() == 2));
    }
}
