use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::error::{ProvisioningError, ProvisioningFailure, ProvisioningPhase};
use super::external::{
    EvolutionClient, ExternalCreateRequest, ExternalInstance, ProvisioningService,
    DEFAULT_INTEGRATION,
};
use super::instance::{ConnectionState, InstanceDraft, InstanceStatus, MessagingInstance};
use super::registry::{HttpInstanceRegistry, InstanceRegistry, RegistryPayload, RegistryRecord};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result, TransportError};
use crate::pairing::{PairingSessionTimer, PAIRING_WINDOW};
use crate::session::Session;
use crate::util::phone::normalize_phone_number;

/// Default wait between deleting and recreating an instance on reset.
pub const DEFAULT_RESET_GRACE: Duration = Duration::from_secs(3);

/// Successful create or reset: the reconciled instance and its pairing
/// countdown, started at the moment provisioning finished.
#[derive(Debug, Clone)]
pub struct ProvisioningOutcome {
    pub instance: MessagingInstance,
    pub pairing: PairingSessionTimer,
}

/// One create or reset run. Tracks the current phase and every identifier
/// learned so far, so a failure can say exactly what exists where.
#[derive(Debug)]
struct ProvisioningAttempt {
    phase: ProvisioningPhase,
    instance_name: String,
    external_instance_id: Option<String>,
    local_id: Option<String>,
    started_at: Instant,
}

impl ProvisioningAttempt {
    fn begin(phase: ProvisioningPhase, instance_name: &str) -> Self {
        info!(%phase, instance_name, "provisioning phase started");
        Self {
            phase,
            instance_name: instance_name.to_string(),
            external_instance_id: None,
            local_id: None,
            started_at: Instant::now(),
        }
    }

    fn advance(&mut self, phase: ProvisioningPhase) {
        info!(
            from = %self.phase,
            to = %phase,
            instance_name = %self.instance_name,
            "provisioning phase started"
        );
        self.phase = phase;
    }

    fn fail(&self, error: ClientError) -> ProvisioningError {
        let failure = ProvisioningFailure::from_client_error(
            self.phase,
            &self.instance_name,
            self.external_instance_id.clone(),
            self.local_id.clone(),
            &error,
        );
        let err = ProvisioningError::at(failure);
        warn!(
            phase = %self.phase,
            instance_name = %self.instance_name,
            external_instance_id = ?self.external_instance_id,
            local_id = ?self.local_id,
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            manual_recovery = err.needs_manual_recovery(),
            error = %error,
            "provisioning phase failed"
        );
        err
    }

    fn finish(&self) {
        info!(
            instance_name = %self.instance_name,
            external_instance_id = ?self.external_instance_id,
            local_id = ?self.local_id,
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "provisioning complete"
        );
    }
}

/// Create/reset workflow across the messaging provider and the local registry.
///
/// Phases only move forward. When a later phase fails, earlier side effects
/// stay in place and the error names the phase and the identifiers involved.
#[derive(Clone)]
pub struct InstanceProvisioningOrchestrator {
    provider: Arc<dyn ProvisioningService>,
    registry: Arc<dyn InstanceRegistry>,
    integration: String,
    reset_grace: Duration,
    pairing_window: Duration,
}

impl std::fmt::Debug for InstanceProvisioningOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceProvisioningOrchestrator")
            .field("integration", &self.integration)
            .field("reset_grace", &self.reset_grace)
            .field("pairing_window", &self.pairing_window)
            .finish()
    }
}

impl InstanceProvisioningOrchestrator {
    pub fn new(provider: Arc<dyn ProvisioningService>, registry: Arc<dyn InstanceRegistry>) -> Self {
        Self {
            provider,
            registry,
            integration: DEFAULT_INTEGRATION.to_string(),
            reset_grace: DEFAULT_RESET_GRACE,
            pairing_window: PAIRING_WINDOW,
        }
    }

    /// Wire the Evolution provider and the backend registry from config.
    pub fn from_config(config: &ClientConfig, session: &Session) -> Self {
        let provider = EvolutionClient::new(config.provider_url(), config.provider_api_key());
        let registry =
            HttpInstanceRegistry::with_path(session.client().clone(), config.instances_path());
        Self::new(Arc::new(provider), Arc::new(registry))
            .with_integration(config.integration())
            .with_reset_grace(config.reset_grace())
            .with_pairing_window(config.pairing_window())
    }

    pub fn with_integration(mut self, integration: impl Into<String>) -> Self {
        self.integration = integration.into();
        self
    }

    pub fn with_reset_grace(mut self, grace: Duration) -> Self {
        self.reset_grace = grace;
        self
    }

    pub fn with_pairing_window(mut self, window: Duration) -> Self {
        self.pairing_window = window;
        self
    }

    /// Allocate a provider instance, then register it locally.
    pub async fn create(
        &self,
        draft: InstanceDraft,
    ) -> std::result::Result<ProvisioningOutcome, ProvisioningError> {
        let draft = draft.validate()?;
        let integration = draft
            .integration
            .clone()
            .unwrap_or_else(|| self.integration.clone());
        let mut attempt =
            ProvisioningAttempt::begin(ProvisioningPhase::ExternalCreate, &draft.instance_name);

        let request = ExternalCreateRequest {
            instance_name: draft.instance_name.clone(),
            number: draft.phone_number.clone(),
            qrcode: true,
            integration: integration.clone(),
        };
        let external = self
            .provider
            .create_instance(&request)
            .await
            .map_err(|e| attempt.fail(e))?;
        attempt.external_instance_id = Some(external.instance_id.clone());

        attempt.advance(ProvisioningPhase::LocalRegister);
        let instance_code = generate_instance_code();
        let payload = RegistryPayload::new(
            &external,
            &instance_code,
            &draft.display_name,
            &draft.phone_number,
            &integration,
            InstanceStatus::Active,
        );
        let record = self
            .registry
            .register(&payload)
            .await
            .map_err(|e| attempt.fail(e))?;
        if record.id.trim().is_empty() {
            return Err(attempt.fail(ClientError::Transport(TransportError::Parse(
                "registry response is missing the instance id".to_string(),
            ))));
        }
        attempt.local_id = Some(record.id.clone());

        let fallback = Fallback {
            instance_code: &instance_code,
            display_name: &draft.display_name,
            phone_number: &draft.phone_number,
            integration: &integration,
        };
        let instance = reconcile(record, &external, &fallback);
        attempt.finish();
        Ok(self.outcome(instance))
    }

    /// Delete and recreate the provider instance under the same name, then
    /// update the local record in place.
    ///
    /// `new_phone_number` replaces the stored number when given. Once the
    /// delete has succeeded the remaining phases run to completion on their
    /// own task, even if the caller stops waiting.
    pub async fn reset(
        &self,
        instance: &MessagingInstance,
        new_phone_number: Option<&str>,
    ) -> std::result::Result<ProvisioningOutcome, ProvisioningError> {
        let phone_number = match new_phone_number {
            Some(raw) => normalize_phone_number(raw).ok_or_else(|| {
                ProvisioningError::InvalidInput(format!("invalid phone number: {raw}"))
            })?,
            None => instance.phone_number.clone(),
        };

        let mut attempt =
            ProvisioningAttempt::begin(ProvisioningPhase::ExternalDelete, &instance.instance_name);
        attempt.external_instance_id = Some(instance.external_instance_id.clone());
        attempt.local_id = Some(instance.local_id.clone());

        self.provider
            .delete_instance(&instance.instance_name)
            .await
            .map_err(|e| attempt.fail(e))?;

        let this = self.clone();
        let instance = instance.clone();
        let known = (
            instance.instance_name.clone(),
            instance.external_instance_id.clone(),
            instance.local_id.clone(),
        );
        let finish = tokio::spawn(async move {
            this.recreate_and_update(attempt, instance, phone_number)
                .await
        });
        match finish.await {
            Ok(result) => result,
            Err(join_err) => {
                let (instance_name, external_instance_id, local_id) = known;
                Err(ProvisioningError::RecreateFailed(ProvisioningFailure {
                    phase: ProvisioningPhase::ExternalRecreate,
                    instance_name,
                    external_instance_id: Some(external_instance_id),
                    local_id: Some(local_id),
                    status: None,
                    cause: format!("reset task aborted: {join_err}"),
                }))
            }
        }
    }

    async fn recreate_and_update(
        &self,
        mut attempt: ProvisioningAttempt,
        instance: MessagingInstance,
        phone_number: String,
    ) -> std::result::Result<ProvisioningOutcome, ProvisioningError> {
        tokio::time::sleep(self.reset_grace).await;

        attempt.advance(ProvisioningPhase::ExternalRecreate);
        let integration = instance
            .integration
            .clone()
            .filter(|integration| !integration.is_empty())
            .unwrap_or_else(|| self.integration.clone());
        let request = ExternalCreateRequest {
            instance_name: instance.instance_name.clone(),
            number: phone_number.clone(),
            qrcode: true,
            integration: integration.clone(),
        };
        let external = self
            .provider
            .create_instance(&request)
            .await
            .map_err(|e| attempt.fail(e))?;
        attempt.external_instance_id = Some(external.instance_id.clone());

        attempt.advance(ProvisioningPhase::LocalUpdate);
        let payload = RegistryPayload::new(
            &external,
            &instance.instance_code,
            &instance.display_name,
            &phone_number,
            &integration,
            instance.status,
        );
        let record = self
            .registry
            .update(&instance.local_id, &payload)
            .await
            .map_err(|e| attempt.fail(e))?;

        let fallback = Fallback {
            instance_code: &instance.instance_code,
            display_name: &instance.display_name,
            phone_number: &phone_number,
            integration: &integration,
        };
        let mut reconciled = reconcile(record, &external, &fallback);
        // Logical identity survives a reset whatever the registry echoes.
        reconciled.local_id = instance.local_id.clone();
        reconciled.instance_code = instance.instance_code.clone();
        if reconciled.created_at.is_none() {
            reconciled.created_at = instance.created_at;
        }
        attempt.finish();
        Ok(self.outcome(reconciled))
    }

    /// Reset the instance stored under `local_id`.
    pub async fn reset_by_id(
        &self,
        local_id: &str,
        new_phone_number: Option<&str>,
    ) -> Result<ProvisioningOutcome> {
        let instance = self.get_instance(local_id).await?;
        Ok(self.reset(&instance, new_phone_number).await?)
    }

    pub async fn list_instances(&self) -> Result<Vec<MessagingInstance>> {
        let records = self.registry.list().await?;
        Ok(records.into_iter().map(from_record).collect())
    }

    pub async fn get_instance(&self, local_id: &str) -> Result<MessagingInstance> {
        let record = self.registry.get(local_id).await?;
        Ok(from_record(record))
    }

    /// Ask the provider for the live connection state. Read-only; the local
    /// registry is not updated.
    pub async fn check_connection(&self, instance: &MessagingInstance) -> Result<ConnectionState> {
        self.provider.connection_state(&instance.instance_name).await
    }

    fn outcome(&self, instance: MessagingInstance) -> ProvisioningOutcome {
        let pairing = PairingSessionTimer::with_window(instance.local_id.clone(), self.pairing_window);
        ProvisioningOutcome { instance, pairing }
    }
}

/// Values to use when the registry response leaves a field empty.
struct Fallback<'a> {
    instance_code: &'a str,
    display_name: &'a str,
    phone_number: &'a str,
    integration: &'a str,
}

/// Merge the registry record with the provider result. The registry owns
/// local id and instance code; the provider owns external id and pairing
/// payload. A freshly provisioned instance is always waiting for a scan.
fn reconcile(
    record: RegistryRecord,
    external: &ExternalInstance,
    fallback: &Fallback<'_>,
) -> MessagingInstance {
    let pairing_payload = external
        .pairing
        .clone()
        .or_else(|| record.pairing_payload());
    MessagingInstance {
        local_id: record.id,
        external_instance_id: external.instance_id.clone(),
        instance_name: external.instance_name.clone(),
        instance_code: non_empty(record.instance_code, fallback.instance_code),
        display_name: record
            .display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| fallback.display_name.to_string()),
        phone_number: non_empty(record.phone_number, fallback.phone_number),
        status: record.status,
        connection_state: ConnectionState::Scanning,
        integration: Some(non_empty(
            record.integration.unwrap_or_default(),
            fallback.integration,
        )),
        pairing_payload,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

fn from_record(record: RegistryRecord) -> MessagingInstance {
    let pairing_payload = record.pairing_payload();
    let display_name = record
        .display_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| record.instance_name.clone());
    MessagingInstance {
        local_id: record.id,
        external_instance_id: record.instance_id.unwrap_or_default(),
        instance_name: record.instance_name,
        instance_code: record.instance_code,
        display_name,
        phone_number: record.phone_number,
        status: record.status,
        connection_state: record.connection_status,
        integration: record.integration.filter(|integration| !integration.is_empty()),
        pairing_payload,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

fn non_empty(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Candidate instance code in `XXXX-XXXX` form. The registry may assign its
/// own; whatever it returns is kept from then on.
fn generate_instance_code() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    format!("{}-{}", &hex[..4], &hex[4..8])
}
