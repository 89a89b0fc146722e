//! Shared data model for modelup.
//!
//! This crate holds the pure, network-free parts of the update manager: the
//! manifest catalog, the dotted-triple version rule used for staleness
//! decisions, and the validated SHA-256 digest newtype.

pub mod hash;
pub mod manifest;
pub mod version;

// Re-exports
pub use hash::{DigestError, Sha256Digest};
pub use manifest::{Manifest, ManifestError, ModelEntry};
pub use version::{ModelVersion, is_newer};

/// Catalog version written into a manifest created from scratch.
pub const EMPTY_MANIFEST_VERSION: &str = "0.0.0";
