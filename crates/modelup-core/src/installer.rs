//! Atomic artifact installation.
//!
//! One `install` call moves a single model through a fixed sequence:
//!
//! 1. validate the download locator and refuse targets that collide with the
//!    manifest's own files
//! 2. create the models directory
//! 3. recover leftovers from an interrupted earlier run
//! 4. move the current artifact aside to `<file>.bak`
//! 5. stream the download into `<file>.part`, preflighting free space once
//!    the content length is known
//! 6. verify the SHA-256 if the manifest publishes one
//! 7. rename `<file>.part` over `<file>`, drop the backup, record the
//!    manifest entry
//!
//! Any failure in steps 5-6 (including cancellation) rolls back: the `.part`
//! file is removed and the backup is renamed back into place. The manifest
//! is only written after the artifact rename, so the path `<file>` is always
//! either absent or a complete artifact from some committed install.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use modelup_schema::ModelEntry;
use modelup_schema::manifest::temp_path_for;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{UpdateError, UpdateResult};
use crate::io::checksum::sha256_file_async;
use crate::io::transport::{ByteSink, TransferProgress, Transport};
use crate::paths::{ArtifactPaths, manifest_lock_path};
use crate::planner::PendingUpdate;
use crate::preflight::{DiskSpace, Fs4DiskSpace, ensure_free_space};
use crate::store::ManifestStore;

/// Per-model download progress, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Model name.
    pub model: String,
    /// Bytes received so far.
    pub received: u64,
    /// Declared size, `0` when unknown.
    pub total: u64,
    /// `floor(received * 100 / total)` clamped to 100, `0` when unknown.
    pub percent: u8,
}

impl ProgressEvent {
    /// Build an event from raw transfer counters.
    pub fn new(model: &str, progress: TransferProgress) -> Self {
        let percent = if progress.total == 0 {
            0
        } else {
            (u128::from(progress.received) * 100 / u128::from(progress.total)).min(100) as u8
        };
        Self {
            model: model.to_string(),
            received: progress.received,
            total: progress.total,
            percent,
        }
    }
}

/// Receiver for [`ProgressEvent`]s. Called on the download task; keep it cheap.
pub type ProgressSink<'a> = dyn Fn(ProgressEvent) + Send + Sync + 'a;

/// A successfully committed artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledModel {
    /// Model name.
    pub name: String,
    /// Version now recorded in the manifest.
    pub version: String,
    /// Artifact file name.
    pub file: String,
    /// Location of the committed artifact.
    pub path: PathBuf,
    /// Bytes downloaded.
    pub bytes: u64,
}

/// Installs artifacts into one models directory.
#[derive(Clone)]
pub struct Installer {
    transport: Arc<dyn Transport>,
    disk: Arc<dyn DiskSpace>,
    store: ManifestStore,
    models_dir: PathBuf,
}

impl fmt::Debug for Installer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installer")
            .field("models_dir", &self.models_dir)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// Create an installer that checks free space through the OS.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: ManifestStore,
        models_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            disk: Arc::new(Fs4DiskSpace),
            store,
            models_dir: models_dir.into(),
        }
    }

    /// Replace the free-space probe.
    pub fn with_disk_space(mut self, disk: Arc<dyn DiskSpace>) -> Self {
        self.disk = disk;
        self
    }

    /// Directory artifacts are installed into.
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Handle to the manifest this installer records into.
    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Download, verify, and commit one pending update.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the install. When the error comes from
    /// the download, the checksum check, or cancellation, the previous
    /// artifact is back in place and the manifest is untouched.
    pub async fn install(
        &self,
        update: &PendingUpdate,
        on_progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> UpdateResult<InstalledModel> {
        let url = update
            .source_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| UpdateError::MissingSourceUrl {
                name: update.name.clone(),
            })?;

        let paths = ArtifactPaths::new(&self.models_dir, &update.file);
        reject_manifest_collision(self.store.path(), &update.name, &paths)?;

        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        fs::create_dir_all(&self.models_dir)
            .await
            .map_err(|e| UpdateError::io("Failed to create directory", &self.models_dir, e))?;

        recover_leftovers(&paths).await?;
        let backup_created = back_up(&paths).await?;

        info!(
            model = %update.name,
            from = update.current_version.as_deref().unwrap_or("-"),
            to = %update.next_version,
            "installing"
        );

        let bytes = match self.fetch_verified(update, url, &paths, on_progress, cancel).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(model = %update.name, "install failed, rolling back: {e}");
                roll_back(&paths, backup_created).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&paths.part, &paths.target).await {
            roll_back(&paths, backup_created).await;
            return Err(UpdateError::io("Failed to commit", &paths.target, e));
        }
        if backup_created {
            remove_best_effort(&paths.backup).await;
        }

        let entry = ModelEntry {
            version: update.next_version.clone(),
            file: update.file.clone(),
            sha256: update.checksum.clone(),
            url: None,
            updated_at: Some(Utc::now()),
        };
        self.store.record_install(&update.name, entry).await?;

        info!(model = %update.name, version = %update.next_version, bytes, "installed");
        Ok(InstalledModel {
            name: update.name.clone(),
            version: update.next_version.clone(),
            file: update.file.clone(),
            path: paths.target,
            bytes,
        })
    }

    /// Steps 5 and 6: stream into `.part`, then verify it.
    async fn fetch_verified(
        &self,
        update: &PendingUpdate,
        url: &str,
        paths: &ArtifactPaths,
        on_progress: &ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> UpdateResult<u64> {
        let mut sink = PartFile::create(
            paths.part.clone(),
            self.models_dir.clone(),
            Arc::clone(&self.disk),
        )
        .await?;
        let forward = |p: TransferProgress| on_progress(ProgressEvent::new(&update.name, p));

        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(UpdateError::Cancelled),
            result = self.transport.fetch_to_sink(url, &mut sink, &forward) => result,
        }?;
        sink.finish().await?;

        if let Some(expected) = &update.checksum {
            let actual = sha256_file_async(&paths.part).await?;
            if !expected.matches(actual.as_str()) {
                return Err(UpdateError::ChecksumMismatch {
                    name: update.name.clone(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
            debug!(model = %update.name, "checksum verified");
        }

        Ok(received)
    }
}

/// The `.part` download target. Preflights free space in `begin`.
struct PartFile {
    file: fs::File,
    path: PathBuf,
    dir: PathBuf,
    disk: Arc<dyn DiskSpace>,
}

impl PartFile {
    async fn create(path: PathBuf, dir: PathBuf, disk: Arc<dyn DiskSpace>) -> UpdateResult<Self> {
        let file = fs::File::create(&path)
            .await
            .map_err(|e| UpdateError::io("Failed to create", &path, e))?;
        Ok(Self {
            file,
            path,
            dir,
            disk,
        })
    }

    async fn finish(&mut self) -> UpdateResult<()> {
        self.file
            .flush()
            .await
            .map_err(|e| UpdateError::io("Failed to flush", &self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| UpdateError::io("Failed to sync", &self.path, e))
    }
}

#[async_trait]
impl ByteSink for PartFile {
    async fn begin(&mut self, total: Option<u64>) -> UpdateResult<()> {
        ensure_free_space(self.disk.as_ref(), &self.dir, total)
    }

    async fn write(&mut self, chunk: &[u8]) -> UpdateResult<()> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| UpdateError::io("Failed to write", &self.path, e))
    }
}

/// An artifact must never touch the manifest, its save scratch file or its lock.
fn reject_manifest_collision(
    manifest: &Path,
    name: &str,
    paths: &ArtifactPaths,
) -> UpdateResult<()> {
    let reserved = [
        manifest.to_path_buf(),
        temp_path_for(manifest),
        manifest_lock_path(manifest),
    ];
    let touched = [&paths.target, &paths.part, &paths.backup];
    if touched.into_iter().any(|p| reserved.contains(p)) {
        return Err(UpdateError::ManifestCorrupt {
            path: manifest.to_path_buf(),
            reason: format!("entry '{name}' would install over {}", paths.target.display()),
        });
    }
    Ok(())
}

async fn exists(path: &Path) -> UpdateResult<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| UpdateError::io("Failed to stat", path, e))
}

/// Undo whatever an interrupted run left behind.
async fn recover_leftovers(paths: &ArtifactPaths) -> UpdateResult<()> {
    if exists(&paths.part).await? {
        debug!(path = %paths.part.display(), "removing stale partial download");
        fs::remove_file(&paths.part)
            .await
            .map_err(|e| UpdateError::io("Failed to remove", &paths.part, e))?;
    }

    if exists(&paths.backup).await? {
        if exists(&paths.target).await? {
            // Crash after commit: the target is the newer artifact.
            debug!(path = %paths.backup.display(), "removing stale backup");
            fs::remove_file(&paths.backup)
                .await
                .map_err(|e| UpdateError::io("Failed to remove", &paths.backup, e))?;
        } else {
            warn!(path = %paths.target.display(), "restoring backup left by interrupted install");
            fs::rename(&paths.backup, &paths.target)
                .await
                .map_err(|e| UpdateError::io("Failed to restore", &paths.target, e))?;
        }
    }

    Ok(())
}

/// Move the current artifact aside. Returns whether there was one.
async fn back_up(paths: &ArtifactPaths) -> UpdateResult<bool> {
    if !exists(&paths.target).await? {
        return Ok(false);
    }
    fs::rename(&paths.target, &paths.backup)
        .await
        .map_err(|e| UpdateError::io("Failed to back up", &paths.target, e))?;
    Ok(true)
}

/// Best-effort: cleanup failures are logged and never replace the original error.
async fn roll_back(paths: &ArtifactPaths, backup_created: bool) {
    remove_best_effort(&paths.part).await;
    remove_best_effort(&paths.target).await;

    if !backup_created {
        return;
    }
    if let Err(e) = fs::rename(&paths.backup, &paths.target).await {
        warn!(path = %paths.backup.display(), "failed to restore backup: {e}");
    }
}

async fn remove_best_effort(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "cleanup failed: {e}"),
    }
}
