use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::instance::{ConnectionState, PairingPayload};
use crate::error::{ClientError, Result};
use crate::http::{read_json, read_json_or_default, shared_client};

/// Default integration requested from the provider.
pub const DEFAULT_INTEGRATION: &str = "WHATSAPP-BAILEYS";

/// Body of `POST /instance/create`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCreateRequest {
    pub instance_name: String,
    pub number: String,
    pub qrcode: bool,
    pub integration: String,
}

/// Instance allocated by the provider, with its fresh pairing payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalInstance {
    pub instance_id: String,
    pub instance_name: String,
    pub pairing: Option<PairingPayload>,
    /// Provider credential for the instance; passed through to the registry.
    pub hash: Option<serde_json::Value>,
}

/// External messaging provider that hosts the instances.
#[async_trait]
pub trait ProvisioningService: Send + Sync {
    /// Allocate an instance and request a pairing QR.
    async fn create_instance(&self, request: &ExternalCreateRequest) -> Result<ExternalInstance>;

    /// Delete an instance by its provider-side name.
    async fn delete_instance(&self, instance_name: &str) -> Result<()>;

    /// Current link state of an instance.
    async fn connection_state(&self, instance_name: &str) -> Result<ConnectionState>;
}

/// [`ProvisioningService`] for an Evolution-style REST API authenticated
/// with an `apikey` header.
///
/// # Example
/// ```no_run
/// use waprov::provisioning::EvolutionClient;
///
/// let client = EvolutionClient::new("https://evolution.example", Some("global-key".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct EvolutionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl EvolutionClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: shared_client().clone(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            if let Ok(val) = HeaderValue::from_str(key) {
                headers.insert("apikey", val);
            }
        }
        headers
    }
}

#[async_trait]
impl ProvisioningService for EvolutionClient {
    async fn create_instance(&self, request: &ExternalCreateRequest) -> Result<ExternalInstance> {
        let url = format!("{}/instance/create", self.base_url);
        tracing::debug!(%url, instance_name = %request.instance_name, "provider create");
        let resp = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(request)
            .send()
            .await?;
        let payload: CreateResponse = read_json(resp).await?;
        payload.into_external()
    }

    async fn delete_instance(&self, instance_name: &str) -> Result<()> {
        let url = format!("{}/instance/delete/{instance_name}", self.base_url);
        tracing::debug!(%url, "provider delete");
        let resp = self
            .client
            .delete(&url)
            .headers(self.headers())
            .send()
            .await?;
        let _ack: serde_json::Value = read_json_or_default(resp).await?;
        Ok(())
    }

    async fn connection_state(&self, instance_name: &str) -> Result<ConnectionState> {
        let url = format!("{}/instance/connectionState/{instance_name}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await?;
        let payload: ConnectionStateResponse = read_json(resp).await?;
        Ok(ConnectionState::from_provider_state(&payload.instance.state))
    }
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    instance: CreatedInstance,
    qrcode: Option<QrCodeResponse>,
    hash: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedInstance {
    instance_id: Option<String>,
    instance_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrCodeResponse {
    base64: Option<String>,
    pairing_code: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionStateResponse {
    instance: ConnectionStateInstance,
}

#[derive(Debug, Deserialize)]
struct ConnectionStateInstance {
    state: String,
}

impl CreateResponse {
    fn into_external(self) -> Result<ExternalInstance> {
        let instance_id = self
            .instance
            .instance_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ClientError::api(502, "provider response missing instance.instanceId")
            })?;
        let pairing = self
            .qrcode
            .map(|qr| PairingPayload {
                qr_base64: qr.base64,
                pairing_code: qr.pairing_code,
                code: qr.code,
            })
            .filter(|payload| !payload.is_empty());
        Ok(ExternalInstance {
            instance_id,
            instance_name: self.instance.instance_name,
            pairing,
            hash: self.hash,
        })
    }
}
