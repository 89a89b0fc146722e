//! Well-known locations.
//!
//! Every artifact owns three sibling paths inside the models directory: the
//! committed file, its `.part` download target, and its `.bak` backup. Keeping
//! them in one directory guarantees the renames between them stay on one
//! filesystem.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use dirs::data_dir;

/// Environment override for the models directory.
pub const MODELS_DIR_ENV: &str = "MODELUP_MODELS_DIR";

/// Environment variable holding the remote manifest URL.
pub const MANIFEST_URL_ENV: &str = "MODELUP_MANIFEST_URL";

/// Environment override for the local manifest path.
pub const MANIFEST_PATH_ENV: &str = "MODELUP_MANIFEST";

/// File name of the local manifest inside the models directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Returns the models directory, or None if no data directory can be resolved.
pub fn try_models_dir() -> Option<PathBuf> {
    if let Ok(val) = std::env::var(MODELS_DIR_ENV) {
        return Some(PathBuf::from(val));
    }
    data_dir().map(|d| d.join("modelup").join("models"))
}

/// Default local manifest location for a models directory.
pub fn manifest_path(models_dir: &Path) -> PathBuf {
    models_dir.join(MANIFEST_FILE_NAME)
}

/// Lock file guarding read-modify-write cycles on a manifest.
pub fn manifest_lock_path(manifest: &Path) -> PathBuf {
    with_suffix(manifest, ".lock")
}

/// The three on-disk locations an install of one artifact touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Committed artifact.
    pub target: PathBuf,
    /// In-progress download.
    pub part: PathBuf,
    /// Previous artifact, moved aside during an install.
    pub backup: PathBuf,
}

impl ArtifactPaths {
    /// Derive the paths for `file` inside `models_dir`.
    pub fn new(models_dir: &Path, file: &str) -> Self {
        let target = models_dir.join(file);
        Self {
            part: with_suffix(&target, ".part"),
            backup: with_suffix(&target, ".bak"),
            target,
        }
    }
}

/// Append a suffix to the full file name (`model.bin` -> `model.bin.part`).
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
