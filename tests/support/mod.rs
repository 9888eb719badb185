#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use waprov::auth::{
    AuthError, CredentialPersistence, CredentialStore, Credentials, LogoutHandler, LogoutReason,
    RefreshCoordinator, RefreshSettings, TokenRefresher,
};
use waprov::error::{ClientError, Result};
use waprov::provisioning::{
    ConnectionState, ExternalCreateRequest, ExternalInstance, InstanceRegistry, PairingPayload,
    ProvisioningService, RegistryPayload, RegistryRecord,
};

// ---------------------------------------------------------------------------
// Auth fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryPersistence {
    saved: Mutex<Option<Credentials>>,
    saves: AtomicUsize,
}

impl InMemoryPersistence {
    pub fn seeded(credentials: Credentials) -> Self {
        Self {
            saved: Mutex::new(Some(credentials)),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saved(&self) -> Option<Credentials> {
        self.saved.lock().expect("persistence lock poisoned").clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CredentialPersistence for InMemoryPersistence {
    fn load(&self) -> std::result::Result<Option<Credentials>, AuthError> {
        Ok(self.saved())
    }

    fn save(&self, credentials: &Credentials) -> std::result::Result<(), AuthError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.saved.lock().expect("persistence lock poisoned") = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> std::result::Result<(), AuthError> {
        *self.saved.lock().expect("persistence lock poisoned") = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingLogoutHandler {
    reasons: Mutex<Vec<LogoutReason>>,
}

impl CountingLogoutHandler {
    pub fn count(&self) -> usize {
        self.reasons.lock().expect("handler lock poisoned").len()
    }

    pub fn reasons(&self) -> Vec<LogoutReason> {
        self.reasons.lock().expect("handler lock poisoned").clone()
    }
}

impl LogoutHandler for CountingLogoutHandler {
    fn on_logout(&self, reason: &LogoutReason) {
        self.reasons
            .lock()
            .expect("handler lock poisoned")
            .push(reason.clone());
    }
}

/// Refresher that answers every call with the same scripted outcome after
/// an optional delay.
pub struct ScriptedRefresher {
    outcome: std::result::Result<Credentials, AuthError>,
    delay: Duration,
    calls: AtomicUsize,
    seen_tokens: Mutex<Vec<String>>,
}

impl ScriptedRefresher {
    pub fn succeeding(credentials: Credentials) -> Self {
        Self::new(Ok(credentials))
    }

    pub fn failing(error: AuthError) -> Self {
        Self::new(Err(error))
    }

    fn new(outcome: std::result::Result<Credentials, AuthError>) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_tokens(&self) -> Vec<String> {
        self.seen_tokens.lock().expect("refresher lock poisoned").clone()
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<Credentials, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens
            .lock()
            .expect("refresher lock poisoned")
            .push(refresh_token.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

pub fn credentials(access: &str, refresh: Option<&str>) -> Credentials {
    Credentials::new(access, refresh.map(String::from))
}

/// Coordinator over an in-memory store seeded with `initial`.
pub fn coordinator(
    initial: Option<Credentials>,
    refresher: Arc<dyn TokenRefresher>,
    handler: Arc<CountingLogoutHandler>,
    settings: RefreshSettings,
) -> RefreshCoordinator {
    let store = Arc::new(CredentialStore::in_memory());
    if let Some(credentials) = initial {
        store.replace(credentials).expect("seed store");
    }
    RefreshCoordinator::with_settings(store, refresher, handler, settings)
}

// ---------------------------------------------------------------------------
// Provisioning fakes
// ---------------------------------------------------------------------------

/// Provider whose create/delete answers are queued up front. Unscripted
/// creates succeed with `ext-<n>` ids; unscripted deletes succeed.
#[derive(Default)]
pub struct ScriptedProvider {
    creates: Mutex<VecDeque<Result<ExternalInstance>>>,
    deletes: Mutex<VecDeque<Result<()>>>,
    create_requests: Mutex<Vec<ExternalCreateRequest>>,
    deleted: Mutex<Vec<String>>,
    state: Mutex<Option<ConnectionState>>,
}

impl ScriptedProvider {
    pub fn push_create(&self, result: Result<ExternalInstance>) {
        self.creates.lock().expect("provider lock").push_back(result);
    }

    pub fn push_delete(&self, result: Result<()>) {
        self.deletes.lock().expect("provider lock").push_back(result);
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("provider lock") = Some(state);
    }

    pub fn create_requests(&self) -> Vec<ExternalCreateRequest> {
        self.create_requests.lock().expect("provider lock").clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("provider lock").clone()
    }
}

#[async_trait]
impl ProvisioningService for ScriptedProvider {
    async fn create_instance(&self, request: &ExternalCreateRequest) -> Result<ExternalInstance> {
        let n = {
            let mut requests = self.create_requests.lock().expect("provider lock");
            requests.push(request.clone());
            requests.len()
        };
        let scripted = self.creates.lock().expect("provider lock").pop_front();
        scripted.unwrap_or_else(|| Ok(external(&format!("ext-{n}"), &request.instance_name)))
    }

    async fn delete_instance(&self, instance_name: &str) -> Result<()> {
        let scripted = self.deletes.lock().expect("provider lock").pop_front();
        let result = scripted.unwrap_or(Ok(()));
        if result.is_ok() {
            self.deleted
                .lock()
                .expect("provider lock")
                .push(instance_name.to_string());
        }
        result
    }

    async fn connection_state(&self, _instance_name: &str) -> Result<ConnectionState> {
        Ok(self
            .state
            .lock()
            .expect("provider lock")
            .unwrap_or(ConnectionState::Disconnected))
    }
}

pub fn external(instance_id: &str, instance_name: &str) -> ExternalInstance {
    ExternalInstance {
        instance_id: instance_id.to_string(),
        instance_name: instance_name.to_string(),
        pairing: Some(PairingPayload {
            qr_base64: Some(format!("data:image/png;base64,QR-{instance_id}")),
            pairing_code: Some("WXYZ-1234".to_string()),
            code: None,
        }),
        hash: None,
    }
}

/// Registry held in memory. Assigns `loc-<n>` ids, or the id and code set
/// with [`assign_next`](Self::assign_next).
#[derive(Default)]
pub struct InMemoryRegistry {
    records: Mutex<HashMap<String, RegistryRecord>>,
    next: Mutex<Option<(String, String)>>,
    fail_register: Mutex<Option<ClientError>>,
    fail_update: Mutex<Option<ClientError>>,
    payloads: Mutex<Vec<RegistryPayload>>,
}

impl InMemoryRegistry {
    pub fn assign_next(&self, local_id: &str, instance_code: &str) {
        *self.next.lock().expect("registry lock") =
            Some((local_id.to_string(), instance_code.to_string()));
    }

    pub fn fail_register_with(&self, error: ClientError) {
        *self.fail_register.lock().expect("registry lock") = Some(error);
    }

    pub fn fail_update_with(&self, error: ClientError) {
        *self.fail_update.lock().expect("registry lock") = Some(error);
    }

    pub fn record(&self, local_id: &str) -> Option<RegistryRecord> {
        self.records.lock().expect("registry lock").get(local_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("registry lock").len()
    }

    pub fn payloads(&self) -> Vec<RegistryPayload> {
        self.payloads.lock().expect("registry lock").clone()
    }

    fn apply(record: &mut RegistryRecord, payload: &RegistryPayload) {
        record.instance_name = payload.instance.instance_name.clone();
        record.instance_id = Some(payload.instance.instance_id.clone());
        record.display_name = Some(payload.display_name.clone());
        record.phone_number = payload.phone_number.clone();
        record.status = payload.status;
        record.connection_status = payload.connection_status;
        record.integration = Some(payload.integration.clone());
        record.base64 = payload.qrcode.as_ref().and_then(|qr| qr.base64.clone());
        record.pairing_code = payload.qrcode.as_ref().and_then(|qr| qr.pairing_code.clone());
        record.updated_at = Some(chrono::Utc::now());
    }
}

#[async_trait]
impl InstanceRegistry for InMemoryRegistry {
    async fn register(&self, payload: &RegistryPayload) -> Result<RegistryRecord> {
        self.payloads.lock().expect("registry lock").push(payload.clone());
        if let Some(error) = self.fail_register.lock().expect("registry lock").take() {
            return Err(error);
        }
        let mut records = self.records.lock().expect("registry lock");
        let (id, code) = self
            .next
            .lock()
            .expect("registry lock")
            .take()
            .unwrap_or_else(|| (format!("loc-{}", records.len() + 1), payload.instance_code.clone()));
        let mut record = RegistryRecord {
            id: id.clone(),
            instance_code: code,
            created_at: Some(chrono::Utc::now()),
            ..Default::default()
        };
        Self::apply(&mut record, payload);
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, local_id: &str, payload: &RegistryPayload) -> Result<RegistryRecord> {
        self.payloads.lock().expect("registry lock").push(payload.clone());
        if let Some(error) = self.fail_update.lock().expect("registry lock").take() {
            return Err(error);
        }
        let mut records = self.records.lock().expect("registry lock");
        let record = records
            .get_mut(local_id)
            .ok_or_else(|| ClientError::api(404, format!("instance {local_id} not found")))?;
        Self::apply(record, payload);
        Ok(record.clone())
    }

    async fn list(&self) -> Result<Vec<RegistryRecord>> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .expect("registry lock")
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn get(&self, local_id: &str) -> Result<RegistryRecord> {
        self.record(local_id)
            .ok_or_else(|| ClientError::api(404, format!("instance {local_id} not found")))
    }
}
