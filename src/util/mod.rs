//! Utility modules: timeout, phone-number normalisation.

pub mod phone;
pub mod timeout;
