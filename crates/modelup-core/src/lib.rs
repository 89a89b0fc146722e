//! Core library for modelup.
//!
//! Keeps a directory of downloaded model artifacts in sync with a remotely
//! published manifest:
//!
//! - [`planner`] decides which models are stale
//! - [`io::transport`] fetches manifests and streams artifacts with redirects
//! - [`installer`] commits one artifact atomically with backup and rollback
//! - [`store`] serializes writes to the local manifest
//! - [`updater`] drives a whole update run with retries

pub mod config;
pub mod error;
pub mod installer;
pub mod io;
pub mod paths;
pub mod planner;
pub mod preflight;
pub mod reporter;
pub mod retry;
pub mod store;
pub mod updater;

// Re-exports
pub use config::UpdaterConfig;
pub use error::{ErrorKind, UpdateError, UpdateResult};
pub use installer::{InstalledModel, Installer, ProgressEvent, ProgressSink};
pub use io::transport::{ByteSink, HttpTransport, TransferProgress, Transport};
pub use planner::{PendingUpdate, plan};
pub use preflight::{DiskSpace, Fs4DiskSpace, FreeSpace, StaticDiskSpace, ensure_free_space};
pub use reporter::{NullReporter, Reporter};
pub use retry::{RetryPolicy, with_retries};
pub use store::ManifestStore;
pub use updater::{ModelOutcome, UpdateReport, Updater};

pub use modelup_schema::{Manifest, ModelEntry, ModelVersion, Sha256Digest, is_newer};

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("modelup/", env!("CARGO_PKG_VERSION"));
