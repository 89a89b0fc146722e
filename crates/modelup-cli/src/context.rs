//! Shared command context.
//!
//! Resolves the models directory, manifest location and network settings
//! from the command line once, and builds the updater every networked
//! command uses.

use anyhow::{Context as _, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use modelup_core::paths::{manifest_path, try_models_dir};
use modelup_core::{HttpTransport, Installer, ManifestStore, Transport, Updater, UpdaterConfig};

use crate::GlobalArgs;

/// Resolved locations and settings for one invocation.
pub struct Context {
    pub models_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest_url: Option<String>,
    pub config: UpdaterConfig,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("models_dir", &self.models_dir)
            .field("manifest_path", &self.manifest_path)
            .field("manifest_url", &self.manifest_url)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let models_dir = args
            .models_dir
            .clone()
            .or_else(try_models_dir)
            .context("Could not determine a models directory; pass --models-dir")?;

        let manifest_path = args
            .manifest
            .clone()
            .unwrap_or_else(|| manifest_path(&models_dir));

        // An empty variable counts as unset.
        let manifest_url = args
            .manifest_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        let config = UpdaterConfig::default()
            .with_retries(args.retries)
            .with_retry_delay(Duration::from_millis(args.retry_delay_ms));

        Ok(Self {
            models_dir,
            manifest_path,
            manifest_url,
            config,
        })
    }

    /// Build an updater over HTTP for this context.
    pub fn updater(&self) -> Result<Updater> {
        let transport: Arc<dyn Transport> = Arc::new(
            HttpTransport::new(&self.config).context("Failed to initialise HTTP client")?,
        );
        let store = ManifestStore::spawn(&self.manifest_path)?;
        let installer = Installer::new(Arc::clone(&transport), store, &self.models_dir);
        Ok(Updater::new(&self.config, transport, installer))
    }
}
