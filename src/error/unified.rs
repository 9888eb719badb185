//! Unified error classification and recovery.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Network,
    Server,
    Api,
    Configuration,
    Serialization,
    Provisioning,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// The session is gone; the user has to log in again.
    SignInAgain,
    /// Nothing changed remotely; the same call can be repeated.
    RetryLater,
    /// External and local state diverged; an operator has to reconcile them.
    ManualRecovery,
    CheckConfiguration,
    ContactSupport,
}
