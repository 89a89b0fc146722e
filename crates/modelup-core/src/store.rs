//! Manifest store actor - serialized access to the local manifest
//!
//! Installs of different models may run concurrently, but they all end by
//! rewriting the same manifest file. A dedicated thread owns that file and
//! handles one request at a time; every request carries a oneshot sender
//! that completes exactly once with the result. Read-modify-write cycles
//! additionally take an exclusive advisory lock on `<manifest>.lock` so two
//! processes sharing a models directory cannot lose each other's entries.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use fs4::FileExt;
use modelup_schema::{Manifest, ModelEntry};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{UpdateError, UpdateResult};
use crate::paths::manifest_lock_path;

type Reply<T> = oneshot::Sender<UpdateResult<T>>;

/// Requests served by the store thread.
enum StoreEvent {
    /// Re-read the manifest from disk.
    Load { resp: Reply<Manifest> },
    /// Last manifest the store has seen, reading it if nothing has been yet.
    Snapshot { resp: Reply<Manifest> },
    /// Replace one entry and persist.
    RecordInstall {
        name: String,
        entry: ModelEntry,
        resp: Reply<Manifest>,
    },
    /// Stop the store thread.
    Shutdown,
}

impl fmt::Debug for StoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { .. } => f.debug_struct("Load").finish_non_exhaustive(),
            Self::Snapshot { .. } => f.debug_struct("Snapshot").finish_non_exhaustive(),
            Self::RecordInstall { name, entry, .. } => f
                .debug_struct("RecordInstall")
                .field("name", name)
                .field("version", &entry.version)
                .finish_non_exhaustive(),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Cloneable handle to the manifest store thread.
#[derive(Clone)]
pub struct ManifestStore {
    sender: mpsc::Sender<StoreEvent>,
    path: PathBuf,
}

impl fmt::Debug for ManifestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ManifestStore {
    /// Start a store thread owning the manifest at `path`.
    ///
    /// Nothing is read until the first request.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(path: impl Into<PathBuf>) -> UpdateResult<Self> {
        let path = path.into();
        let (sender, receiver) = mpsc::channel();

        let owned = path.clone();
        thread::Builder::new()
            .name("modelup-manifest".into())
            .spawn(move || run_store_loop(&owned, &receiver))
            .map_err(|e| UpdateError::io("Failed to start manifest store for", &path, e))?;

        Ok(Self { sender, path })
    }

    /// Location of the managed manifest.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn request<T, F>(&self, f: F) -> UpdateResult<T>
    where
        F: FnOnce(Reply<T>) -> StoreEvent,
    {
        let (tx, rx) = oneshot::channel();
        self.sender.send(f(tx)).map_err(|_| self.stopped())?;
        rx.await.map_err(|_| self.stopped())?
    }

    fn stopped(&self) -> UpdateError {
        UpdateError::io(
            "Manifest store is no longer running for",
            &self.path,
            io::Error::new(io::ErrorKind::BrokenPipe, "store thread exited"),
        )
    }

    /// Read the manifest from disk. A missing file yields the empty manifest.
    ///
    /// # Errors
    ///
    /// Returns `ManifestCorrupt` for unparseable content and `Io` for
    /// unreadable files.
    pub async fn load(&self) -> UpdateResult<Manifest> {
        self.request(|resp| StoreEvent::Load { resp }).await
    }

    /// The last manifest this store loaded or wrote.
    ///
    /// # Errors
    ///
    /// Same as [`ManifestStore::load`] when nothing has been read yet.
    pub async fn snapshot(&self) -> UpdateResult<Manifest> {
        self.request(|resp| StoreEvent::Snapshot { resp }).await
    }

    /// Persist `entry` under `name`, replacing any previous entry.
    ///
    /// The on-disk manifest is re-read under the lock first, so entries
    /// written by other installs since the last load are kept. Returns the
    /// manifest as saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock, read, or atomic save fails. The on-disk
    /// manifest is unchanged in that case.
    pub async fn record_install(
        &self,
        name: impl Into<String>,
        entry: ModelEntry,
    ) -> UpdateResult<Manifest> {
        let name = name.into();
        self.request(|resp| StoreEvent::RecordInstall { name, entry, resp })
            .await
    }

    /// Ask the store thread to exit once queued requests are served.
    pub fn shutdown(&self) {
        let _ = self.sender.send(StoreEvent::Shutdown);
    }
}

fn run_store_loop(path: &Path, receiver: &mpsc::Receiver<StoreEvent>) {
    let mut cached: Option<Manifest> = None;

    while let Ok(event) = receiver.recv() {
        match event {
            StoreEvent::Load { resp } => {
                let result = read(path);
                if let Ok(manifest) = &result {
                    cached = Some(manifest.clone());
                }
                let _ = resp.send(result);
            }
            StoreEvent::Snapshot { resp } => {
                if cached.is_none() {
                    match read(path) {
                        Ok(manifest) => cached = Some(manifest),
                        Err(e) => {
                            let _ = resp.send(Err(e));
                            continue;
                        }
                    }
                }
                let _ = resp.send(Ok(cached.clone().unwrap_or_default()));
            }
            StoreEvent::RecordInstall { name, entry, resp } => {
                let result = record(path, name, entry);
                if let Ok(manifest) = &result {
                    cached = Some(manifest.clone());
                }
                let _ = resp.send(result);
            }
            StoreEvent::Shutdown => break,
        }
    }
    debug!(path = %path.display(), "manifest store stopped");
}

fn read(path: &Path) -> UpdateResult<Manifest> {
    Manifest::load(path).map_err(|e| UpdateError::manifest(path, e))
}

fn record(path: &Path, name: String, entry: ModelEntry) -> UpdateResult<Manifest> {
    let _guard = lock(path)?;

    let mut manifest = read(path)?;
    debug!(model = %name, version = %entry.version, "recording install");
    manifest.upsert(name, entry);
    manifest
        .save(path)
        .map_err(|e| UpdateError::manifest(path, e))?;

    Ok(manifest)
}

/// Take the cross-process lock. Released when the returned file is dropped.
fn lock(manifest: &Path) -> UpdateResult<File> {
    let lock_path = manifest_lock_path(manifest);
    if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| UpdateError::io("Failed to create directory", parent, e))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| UpdateError::io("Failed to open lock file", &lock_path, e))?;
    file.lock_exclusive()
        .map_err(|e| UpdateError::io("Failed to lock", &lock_path, e))?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn entry(version: &str, file: &str) -> ModelEntry {
        ModelEntry {
            version: version.to_string(),
            file: file.to_string(),
            sha256: None,
            url: None,
            updated_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = ManifestStore::spawn(temp.path().join("manifest.json")).unwrap();

        let manifest = store.load().await.unwrap();
        assert!(manifest.models.is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_record_install_persists_and_keeps_other_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.json");

        let mut initial = Manifest::empty();
        initial.upsert("a", entry("1.0.0", "a.bin"));
        initial.upsert("b", entry("2.0.0", "b.bin"));
        initial.save(&path).unwrap();

        let store = ManifestStore::spawn(&path).unwrap();
        store
            .record_install("a", entry("1.1.0", "a.bin"))
            .await
            .unwrap();

        let on_disk = Manifest::load(&path).unwrap();
        assert_eq!(on_disk.get("a").unwrap().version, "1.1.0");
        assert_eq!(on_disk.get("b").unwrap().version, "2.0.0");
        let names: Vec<_> = on_disk.models.keys().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);

        assert_eq!(store.snapshot().await.unwrap(), on_disk);
    }

    #[tokio::test]
    async fn test_concurrent_records_do_not_lose_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.json");
        let store = ManifestStore::spawn(&path).unwrap();

        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .record_install(format!("m{i}"), entry("1.0.0", &format!("m{i}.bin")))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let on_disk = Manifest::load(&path).unwrap();
        assert_eq!(on_disk.models.len(), 16);
    }

    #[tokio::test]
    async fn test_separate_stores_share_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.json");
        let first = ManifestStore::spawn(&path).unwrap();
        let second = ManifestStore::spawn(&path).unwrap();

        first
            .record_install("a", entry("1.0.0", "a.bin"))
            .await
            .unwrap();
        second
            .record_install("b", entry("1.0.0", "b.bin"))
            .await
            .unwrap();

        let on_disk = Manifest::load(&path).unwrap();
        assert!(on_disk.get("a").is_some());
        assert!(on_disk.get("b").is_some());
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_reported_and_left_alone() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = ManifestStore::spawn(&path).unwrap();
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, UpdateError::ManifestCorrupt { .. }));

        let err = store
            .record_install("a", entry("1.0.0", "a.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::ManifestCorrupt { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_fail() {
        let temp = TempDir::new().unwrap();
        let store = ManifestStore::spawn(temp.path().join("manifest.json")).unwrap();
        store.shutdown();

        // The thread may still be draining; wait for it to observe Shutdown.
        let mut failed = false;
        for _ in 0..50 {
            if store.load().await.is_err() {
                failed = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(failed);
    }
}
