//! The model manifest: a catalog of artifact versions.
//!
//! The same shape is used for the locally installed record (`manifest.json`
//! next to the models) and for the remotely published catalog. Remote entries
//! additionally carry a download `url`; local entries carry `updatedAt`.
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "models": {
//!     "upscale": { "version": "1.2.0", "file": "upscale.bin", "sha256": null }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::EMPTY_MANIFEST_VERSION;
use crate::hash::Sha256Digest;

/// Suffixes the installer uses for its own sibling files.
const RESERVED_SUFFIXES: [&str; 2] = [".part", ".bak"];

/// Errors that can occur while reading or writing a manifest file.
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    /// The manifest file exists but could not be read or written.
    #[error("Failed to access manifest {}: {source}", path.display())]
    Io {
        /// Manifest location.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// The manifest is not valid JSON of the expected shape.
    #[error("Failed to parse manifest {}: {source}", path.display())]
    Parse {
        /// Manifest location.
        path: PathBuf,
        /// Underlying JSON failure.
        source: serde_json::Error,
    },

    /// The manifest parsed, but an entry violates a structural rule.
    #[error("Invalid manifest entry '{name}': {reason}")]
    InvalidEntry {
        /// Model name of the offending entry.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// A single model in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    /// Dotted-triple artifact version, e.g. `"1.2.0"`.
    pub version: String,

    /// Artifact file name, relative to the models directory.
    pub file: String,

    /// Expected SHA-256 of the artifact, or `null` when unknown.
    #[serde(default)]
    pub sha256: Option<Sha256Digest>,

    /// Download locator. Present in remote manifests only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// When this entry was last installed. Present in local manifests only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ModelEntry {
    /// Check the structural rules a loaded entry must satisfy.
    ///
    /// `file` must be a bare file name so installs stay inside the models
    /// directory and every model only ever touches its own paths.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::InvalidEntry`] describing the first violation.
    pub fn validate(&self, name: &str) -> Result<(), ManifestError> {
        let invalid = |reason: &str| ManifestError::InvalidEntry {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() {
            return Err(invalid("model name is empty"));
        }
        if self.file.is_empty() {
            return Err(invalid("file is empty"));
        }
        if self.file == "." || self.file == ".." {
            return Err(invalid("file must name a regular file"));
        }
        if self.file.contains(['/', '\\']) {
            return Err(invalid("file must not contain path separators"));
        }
        if RESERVED_SUFFIXES.iter().any(|s| self.file.ends_with(*s)) {
            return Err(invalid("file must not end in .part or .bak"));
        }
        Ok(())
    }
}

/// A catalog of installed or published models, keyed by model name.
///
/// Entry order is preserved from the JSON document, which makes planning
/// deterministic for a given remote payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Catalog/schema version. Informational only.
    pub version: String,

    /// Model entries by name.
    #[serde(default)]
    pub models: IndexMap<String, ModelEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: EMPTY_MANIFEST_VERSION.to_string(),
            models: IndexMap::new(),
        }
    }
}

impl Manifest {
    /// The manifest used when nothing has been installed yet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse and validate a manifest from JSON bytes.
    ///
    /// `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] for malformed JSON and
    /// [`ManifestError::InvalidEntry`] for structurally invalid entries or
    /// two entries sharing one `file`.
    pub fn from_slice(bytes: &[u8], origin: &Path) -> Result<Self, ManifestError> {
        let manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|source| ManifestError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for (name, entry) in &manifest.models {
            entry.validate(name)?;
            if let Some(other) = owners.insert(&entry.file, name) {
                return Err(ManifestError::InvalidEntry {
                    name: name.clone(),
                    reason: format!("file '{}' is already used by '{other}'", entry.file),
                });
            }
        }

        Ok(manifest)
    }

    /// Load a manifest from disk.
    ///
    /// A missing file is not an error: the empty manifest is returned so the
    /// first run is handled like every other run.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::from_slice(&bytes, path)
    }

    /// Serialize as pretty JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// Atomically persist this manifest to `path`.
    ///
    /// The document is written to `<path>.tmp`, flushed to stable storage and
    /// renamed over the destination, so readers see either the previous or
    /// the new manifest and never a truncated one.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, the temp write, or the rename fails.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let io_err = |source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        };

        let content = self
            .to_json_pretty()
            .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let temp_path = temp_path_for(path);
        {
            let mut file = fs::File::create(&temp_path).map_err(io_err)?;
            file.write_all(content.as_bytes()).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&temp_path, path).map_err(io_err)?;

        Ok(())
    }

    /// Look up an entry by model name.
    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.models.get(name)
    }

    /// Insert or replace the entry for `name`, keeping its position if it
    /// already exists.
    pub fn upsert(&mut self, name: impl Into<String>, entry: ModelEntry) {
        self.models.insert(name.into(), entry);
    }
}

/// Scratch file [`Manifest::save`] writes before renaming over `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
