//! Waprov: authenticated request layer and messaging-instance provisioning.
//!
//! Two halves:
//! - [`auth`] and [`http`]: attach bearer credentials to every backend call,
//!   refresh them exactly once when a burst of calls finds the session
//!   expired, retry the call once, and fall back to a logged-out state when
//!   the refresh itself fails.
//! - [`provisioning`] and [`pairing`]: create and reset externally hosted
//!   messaging instances, mirroring them into the local registry, and run
//!   the advisory pairing countdown shown next to the QR code.
//!
//! # Quick Start
//!
//! ```no_run
//! use waprov::prelude::*;
//!
//! # async fn example() -> waprov::error::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let session = Session::from_config(&config)?;
//! let orchestrator = InstanceProvisioningOrchestrator::from_config(&config, &session);
//!
//! let draft = InstanceDraft::builder()
//!     .display_name("SEDE_A".to_string())
//!     .phone_number("51987654321".to_string())
//!     .build();
//! let outcome = orchestrator.create(draft).await?;
//! println!("{} pairing for {}s", outcome.instance.instance_code, outcome.pairing.remaining_seconds());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod pairing;
pub mod prelude;
pub mod provisioning;
pub mod session;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
