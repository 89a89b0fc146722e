//! Whole-update driver.
//!
//! Fetches the remote manifest, plans against the local one and installs
//! each pending model in plan order. A model that still fails after its
//! retries are spent is recorded in the report and the driver moves on, so
//! one bad artifact does not hold back unrelated models.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use modelup_schema::Manifest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::UpdaterConfig;
use crate::error::{ErrorKind, UpdateError, UpdateResult};
use crate::installer::{Installer, ProgressEvent, ProgressSink};
use crate::io::transport::Transport;
use crate::planner::{self, PendingUpdate};
use crate::reporter::Reporter;
use crate::retry::RetryPolicy;

/// Final state of one pending update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutcome {
    /// Installed and recorded.
    Updated {
        /// Model name.
        name: String,
        /// Previously recorded version, `None` for a fresh install.
        from: Option<String>,
        /// Installed version.
        to: String,
    },
    /// Gave up after retries.
    Failed {
        /// Model name.
        name: String,
        /// Classification of the last error.
        kind: ErrorKind,
        /// Human-readable description of the last error.
        message: String,
    },
}

impl ModelOutcome {
    /// The model this outcome is about.
    pub fn name(&self) -> &str {
        match self {
            Self::Updated { name, .. } | Self::Failed { name, .. } => name,
        }
    }

    /// Whether the model ended up installed.
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// Result of [`Updater::update_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// One outcome per pending update, in plan order.
    pub outcomes: Vec<ModelOutcome>,
    /// Remote models that were already installed at the offered version.
    pub up_to_date: Vec<String>,
}

impl UpdateReport {
    /// Number of models installed.
    pub fn updated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_updated()).count()
    }

    /// Outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ModelOutcome> {
        self.outcomes.iter().filter(|o| !o.is_updated())
    }

    /// Whether every pending update succeeded.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Drives check and update runs against one models directory.
pub struct Updater {
    transport: Arc<dyn Transport>,
    installer: Installer,
    retry: RetryPolicy,
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("installer", &self.installer)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Updater {
    /// Create a driver. `transport` is used for the remote manifest; the
    /// installer brings its own for artifacts.
    pub fn new(
        config: &UpdaterConfig,
        transport: Arc<dyn Transport>,
        installer: Installer,
    ) -> Self {
        Self {
            transport,
            installer,
            retry: RetryPolicy::from(config),
        }
    }

    /// The installer used for artifacts.
    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    /// Read the local manifest.
    ///
    /// # Errors
    ///
    /// Returns `ManifestCorrupt` or `Io` if the local manifest is unusable.
    pub async fn local_manifest(&self) -> UpdateResult<Manifest> {
        self.installer.store().load().await
    }

    /// Fetch and validate the remote manifest, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last transport error once retries are spent, or
    /// `ManifestCorrupt` if the payload is not a valid manifest.
    pub async fn fetch_remote(&self, url: &str) -> UpdateResult<Manifest> {
        let bytes = self
            .retry
            .run_if(|_| self.transport.fetch_bytes(url), UpdateError::is_retryable)
            .await?;
        debug!(url, bytes = bytes.len(), "fetched remote manifest");

        let origin = Path::new(url);
        Manifest::from_slice(&bytes, origin).map_err(|e| UpdateError::manifest(origin, e))
    }

    /// Fetch the remote manifest and plan against the local one.
    ///
    /// Returns the remote manifest together with the pending updates.
    ///
    /// # Errors
    ///
    /// Returns an error if either manifest cannot be obtained.
    pub async fn check(&self, remote_url: &str) -> UpdateResult<(Manifest, Vec<PendingUpdate>)> {
        let local = self.local_manifest().await?;
        let remote = self.fetch_remote(remote_url).await?;
        let pending = planner::plan(&local, &remote);
        info!(
            remote_models = remote.models.len(),
            pending = pending.len(),
            "update check complete"
        );
        Ok((remote, pending))
    }

    /// Install every pending update from `remote`, in plan order.
    ///
    /// Each install is retried as a whole (fresh download, fresh checksum)
    /// for retryable errors. Per-model failures land in the report. Once
    /// `cancel` fires, models not yet started are reported as cancelled
    /// without being attempted.
    ///
    /// # Errors
    ///
    /// Returns an error only if the local manifest cannot be read.
    pub async fn update_all(
        &self,
        remote: &Manifest,
        reporter: &dyn Reporter,
        cancel: &CancellationToken,
    ) -> UpdateResult<UpdateReport> {
        let local = self.local_manifest().await?;
        let pending = planner::plan(&local, remote);
        let up_to_date = planner::up_to_date(&local, remote)
            .into_iter()
            .map(String::from)
            .collect();

        let on_progress: &ProgressSink<'_> = &|event: ProgressEvent| reporter.progress(&event);
        let mut outcomes = Vec::with_capacity(pending.len());

        for (index, update) in pending.iter().enumerate() {
            if cancel.is_cancelled() {
                let skipped = &pending[index..];
                info!(skipped = skipped.len(), "update cancelled");
                outcomes.extend(skipped.iter().map(|update| ModelOutcome::Failed {
                    name: update.name.clone(),
                    kind: ErrorKind::Cancelled,
                    message: UpdateError::Cancelled.to_string(),
                }));
                break;
            }

            reporter.started(update);

            let result = self
                .retry
                .run_until(
                    |_| self.installer.install(update, on_progress, cancel),
                    UpdateError::is_retryable,
                    cancel,
                )
                .await;

            outcomes.push(match result {
                Ok(installed) => {
                    reporter.updated(&installed);
                    ModelOutcome::Updated {
                        name: update.name.clone(),
                        from: update.current_version.clone(),
                        to: installed.version,
                    }
                }
                Err(e) => {
                    reporter.failed(&update.name, &e);
                    ModelOutcome::Failed {
                        name: update.name.clone(),
                        kind: e.kind(),
                        message: e.to_string(),
                    }
                }
            });
        }

        Ok(UpdateReport {
            outcomes,
            up_to_date,
        })
    }
}
