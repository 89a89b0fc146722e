//! Command implementations.

pub mod check;
pub mod hash;
pub mod status;
pub mod update;

/// Printed when no remote manifest is configured.
pub const NO_UPDATES: &str = "No updates available";
