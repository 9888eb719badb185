use std::fmt;

use serde::Serialize;
use strum::Display;
use thiserror::Error;

use crate::error::ClientError;

/// Step of a create or reset run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningPhase {
    ExternalCreate,
    LocalRegister,
    ExternalDelete,
    ExternalRecreate,
    LocalUpdate,
}

/// What was known when a phase failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningFailure {
    pub phase: ProvisioningPhase,
    pub instance_name: String,
    /// External id live at the time of failure, if any.
    pub external_instance_id: Option<String>,
    pub local_id: Option<String>,
    /// HTTP status of the failed call, when it got that far.
    pub status: Option<u16>,
    pub cause: String,
}

impl ProvisioningFailure {
    pub(crate) fn from_client_error(
        phase: ProvisioningPhase,
        instance_name: &str,
        external_instance_id: Option<String>,
        local_id: Option<String>,
        error: &ClientError,
    ) -> Self {
        Self {
            phase,
            instance_name: instance_name.to_string(),
            external_instance_id,
            local_id,
            status: error.status(),
            cause: error.to_string(),
        }
    }
}

impl fmt::Display for ProvisioningFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase {} for instance {}", self.phase, self.instance_name)?;
        if let Some(external) = &self.external_instance_id {
            write!(f, " (external {external}")?;
            match &self.local_id {
                Some(local) => write!(f, ", local {local})")?,
                None => write!(f, ")")?,
            }
        } else if let Some(local) = &self.local_id {
            write!(f, " (local {local})")?;
        }
        write!(f, ": {}", self.cause)
    }
}

/// Provisioning failures, one variant per phase.
///
/// Nothing is rolled back. Variants after the first external call mean the
/// provider and the local registry may disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    #[error("Invalid instance: {0}")]
    InvalidInput(String),
    /// Nothing was created anywhere.
    #[error("External create failed: {0}")]
    ExternalCreateFailed(ProvisioningFailure),
    /// The provider holds an instance the registry does not know about.
    #[error("Local register failed, external instance orphaned: {0}")]
    LocalRegisterFailed(ProvisioningFailure),
    /// The original instance is untouched.
    #[error("External delete failed: {0}")]
    ExternalDeleteFailed(ProvisioningFailure),
    /// The provider no longer has the instance; the registry still points at it.
    #[error("External recreate failed, instance needs manual recovery: {0}")]
    RecreateFailed(ProvisioningFailure),
    /// The provider has a new instance; the registry still holds the old one.
    #[error("Local update failed, registry is stale: {0}")]
    LocalUpdateFailed(ProvisioningFailure),
}

impl ProvisioningError {
    pub(crate) fn at(failure: ProvisioningFailure) -> Self {
        match failure.phase {
            ProvisioningPhase::ExternalCreate => Self::ExternalCreateFailed(failure),
            ProvisioningPhase::LocalRegister => Self::LocalRegisterFailed(failure),
            ProvisioningPhase::ExternalDelete => Self::ExternalDeleteFailed(failure),
            ProvisioningPhase::ExternalRecreate => Self::RecreateFailed(failure),
            ProvisioningPhase::LocalUpdate => Self::LocalUpdateFailed(failure),
        }
    }

    pub fn failure(&self) -> Option<&ProvisioningFailure> {
        match self {
            Self::InvalidInput(_) => None,
            Self::ExternalCreateFailed(failure)
            | Self::LocalRegisterFailed(failure)
            | Self::ExternalDeleteFailed(failure)
            | Self::RecreateFailed(failure)
            | Self::LocalUpdateFailed(failure) => Some(failure),
        }
    }

    /// Phase that failed; `None` when the input was rejected up front.
    pub fn phase(&self) -> Option<ProvisioningPhase> {
        self.failure().map(|failure| failure.phase)
    }

    /// Whether external side effects happened that the registry does not reflect.
    pub fn needs_manual_recovery(&self) -> bool {
        matches!(
            self,
            Self::LocalRegisterFailed(_) | Self::RecreateFailed(_) | Self::LocalUpdateFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(phase: ProvisioningPhase) -> ProvisioningFailure {
        ProvisioningFailure {
            phase,
            instance_name: "SEDE_A".to_string(),
            external_instance_id: Some("ext-1".to_string()),
            local_id: Some("loc-1".to_string()),
            status: Some(500),
            cause: "HTTP error 500".to_string(),
        }
    }

    #[test]
    fn display_names_the_phase_and_identifiers() {
        let err = ProvisioningError::at(failure(ProvisioningPhase::ExternalDelete));
        assert_eq!(
            err.to_string(),
            "External delete failed: phase EXTERNAL_DELETE for instance SEDE_A \
             (external ext-1, local loc-1): HTTP error 500"
        );
    }

    #[test]
    fn at_picks_variant_from_phase() {
        assert!(matches!(
            ProvisioningError::at(failure(ProvisioningPhase::ExternalRecreate)),
            ProvisioningError::RecreateFailed(_)
        ));
        assert!(matches!(
            ProvisioningError::at(failure(ProvisioningPhase::LocalRegister)),
            ProvisioningError::LocalRegisterFailed(_)
        ));
    }

    #[test]
    fn only_divergent_states_need_manual_recovery() {
        let divergent = [
            ProvisioningPhase::LocalRegister,
            ProvisioningPhase::ExternalRecreate,
            ProvisioningPhase::LocalUpdate,
        ];
        for phase in divergent {
            assert!(ProvisioningError::at(failure(phase)).needs_manual_recovery());
        }
        assert!(!ProvisioningError::at(failure(ProvisioningPhase::ExternalCreate))
            .needs_manual_recovery());
        assert!(!ProvisioningError::at(failure(ProvisioningPhase::ExternalDelete))
            .needs_manual_recovery());
        assert!(!ProvisioningError::InvalidInput("x".to_string()).needs_manual_recovery());
    }
}
