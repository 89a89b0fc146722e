//! Update planning: which remote entries need installing.
//!
//! Version is the only staleness signal. An entry whose version matches the
//! installed one is up to date even if its checksum differs.

use modelup_schema::{Manifest, ModelEntry, Sha256Digest, is_newer};

/// One model that needs to be downloaded and installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    /// Model name.
    pub name: String,
    /// Locally recorded version, `None` for a fresh install.
    pub current_version: Option<String>,
    /// Version the remote manifest offers.
    pub next_version: String,
    /// Artifact file name inside the models directory.
    pub file: String,
    /// Expected digest, if the remote publishes one.
    pub checksum: Option<Sha256Digest>,
    /// Download locator.
    pub source_url: Option<String>,
}

impl PendingUpdate {
    fn from_remote(name: &str, remote: &ModelEntry, local: Option<&ModelEntry>) -> Self {
        Self {
            name: name.to_string(),
            current_version: local.map(|e| e.version.clone()),
            next_version: remote.version.clone(),
            file: remote.file.clone(),
            checksum: remote.sha256.clone(),
            source_url: remote.url.clone(),
        }
    }

    /// Whether this installs a model that was never recorded locally.
    pub fn is_fresh(&self) -> bool {
        self.current_version.is_none()
    }
}

/// Compute pending updates in the remote manifest's entry order.
///
/// Local entries missing from `remote` are left alone.
pub fn plan(local: &Manifest, remote: &Manifest) -> Vec<PendingUpdate> {
    remote
        .models
        .iter()
        .filter_map(|(name, remote_entry)| {
            let local_entry = local.get(name);
            let stale = match local_entry {
                None => true,
                Some(installed) => is_newer(&remote_entry.version, &installed.version),
            };
            stale.then(|| PendingUpdate::from_remote(name, remote_entry, local_entry))
        })
        .collect()
}

/// Names of remote entries that are already installed at the offered version
/// or newer.
pub fn up_to_date<'a>(local: &Manifest, remote: &'a Manifest) -> Vec<&'a str> {
    remote
        .models
        .iter()
        .filter(|(name, remote_entry)| {
            local
                .get(name)
                .is_some_and(|installed| !is_newer(&remote_entry.version, &installed.version))
        })
        .map(|(name, _)| name.as_str())
        .collect()
}
