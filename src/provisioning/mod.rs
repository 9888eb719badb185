//! Creation and reset of externally hosted messaging instances.
//!
//! The external provider owns the live session (instance id, connection
//! state, pairing QR); the local registry owns the logical identity (local
//! id, instance code). [`InstanceProvisioningOrchestrator`] drives both and
//! reports partial failures by phase instead of repairing them.

pub mod error;
pub mod external;
pub mod instance;
pub mod orchestrator;
pub mod registry;

pub use error::{ProvisioningError, ProvisioningFailure, ProvisioningPhase};
pub use external::{EvolutionClient, ExternalCreateRequest, ExternalInstance, ProvisioningService};
pub use instance::{ConnectionState, InstanceDraft, InstanceStatus, MessagingInstance, PairingPayload};
pub use orchestrator::{InstanceProvisioningOrchestrator, ProvisioningOutcome};
pub use registry::{HttpInstanceRegistry, InstanceRegistry, RegistryPayload, RegistryRecord};
