//! Advisory countdown shown next to a pairing QR.
//!
//! The countdown never talks to the provider: running out only changes what
//! the UI displays and whether it offers a restart. The provider's own
//! session expiry is authoritative.

pub mod countdown;

pub use countdown::PairingCountdown;

use std::time::Duration;

use serde::Serialize;

/// Length of the window that starts when provisioning succeeds.
pub const PAIRING_WINDOW: Duration = Duration::from_secs(60);

/// Snapshot of a pairing countdown, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingSession {
    pub instance_ref: String,
    pub remaining_seconds: u32,
    pub is_expired: bool,
}

/// One-second countdown for a single instance's pairing window.
///
/// # Example
/// ```
/// use waprov::pairing::PairingSessionTimer;
///
/// let mut timer = PairingSessionTimer::start("loc-1");
/// assert_eq!(timer.tick(), 59);
/// timer.restart();
/// assert_eq!(timer.remaining_seconds(), 60);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSessionTimer {
    instance_ref: String,
    window_secs: u32,
    remaining: u32,
}

impl PairingSessionTimer {
    /// Start a countdown over the default 60-second window.
    pub fn start(instance_ref: impl Into<String>) -> Self {
        Self::with_window(instance_ref, PAIRING_WINDOW)
    }

    /// Start a countdown over `window`, rounded down to whole seconds.
    pub fn with_window(instance_ref: impl Into<String>, window: Duration) -> Self {
        let window_secs = u32::try_from(window.as_secs()).unwrap_or(u32::MAX);
        Self {
            instance_ref: instance_ref.into(),
            window_secs,
            remaining: window_secs,
        }
    }

    /// Advance by one second; saturates at zero.
    pub fn tick(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            tracing::debug!(instance_ref = %self.instance_ref, "pairing window expired");
        }
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining
    }

    pub fn instance_ref(&self) -> &str {
        &self.instance_ref
    }

    /// Reset to a full window. Does not request a new QR.
    pub fn restart(&mut self) {
        self.remaining = self.window_secs;
    }

    pub fn session(&self) -> PairingSession {
        PairingSession {
            instance_ref: self.instance_ref.clone(),
            remaining_seconds: self.remaining,
            is_expired: self.is_expired(),
        }
    }
}
