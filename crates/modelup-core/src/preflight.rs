//! Free-space checks before a download is written to disk.
//!
//! The probe is injectable. A platform that cannot report free space answers
//! [`FreeSpace::Unknown`] and the check degrades to a logged no-op instead of
//! silently pretending to protect the caller.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{UpdateError, UpdateResult};

/// Result of a free-space query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeSpace {
    /// Bytes available to the current user.
    Known(u64),
    /// The platform could not answer.
    Unknown,
}

/// Source of free-space information for a directory's filesystem.
pub trait DiskSpace: Send + Sync {
    /// Query free space on the filesystem containing `dir`.
    fn available(&self, dir: &Path) -> FreeSpace;
}

/// Queries the OS through `fs4`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fs4DiskSpace;

impl DiskSpace for Fs4DiskSpace {
    fn available(&self, dir: &Path) -> FreeSpace {
        match fs4::available_space(dir) {
            Ok(bytes) => FreeSpace::Known(bytes),
            Err(e) => {
                warn!(
                    dir = %dir.display(),
                    "free space unavailable, continuing without disk check: {e}"
                );
                FreeSpace::Unknown
            }
        }
    }
}

/// Fixed answer, for tests and for embedders that manage quotas themselves.
#[derive(Debug, Clone, Copy)]
pub struct StaticDiskSpace(pub FreeSpace);

impl DiskSpace for StaticDiskSpace {
    fn available(&self, _dir: &Path) -> FreeSpace {
        self.0
    }
}

/// Fail if `dir`'s filesystem has less than `required` bytes free.
///
/// Unknown sizes and unknown free space never block an update.
///
/// # Errors
///
/// Returns [`UpdateError::InsufficientDiskSpace`] when the known free space
/// is below the known requirement.
pub fn ensure_free_space(
    probe: &dyn DiskSpace,
    dir: &Path,
    required: Option<u64>,
) -> UpdateResult<()> {
    let Some(required) = required.filter(|&n| n > 0) else {
        return Ok(());
    };

    match probe.available(dir) {
        FreeSpace::Known(available) if available < required => {
            Err(UpdateError::InsufficientDiskSpace {
                required,
                available,
            })
        }
        FreeSpace::Known(available) => {
            debug!(required, available, "disk preflight passed");
            Ok(())
        }
        FreeSpace::Unknown => Ok(()),
    }
}
