//! Installer and updater against a real HTTP server.

use std::sync::Arc;
use std::time::Duration;

use mockito::Server;
use modelup_core::io::checksum::sha256_bytes;
use modelup_core::{
    ErrorKind, FreeSpace, HttpTransport, Installer, Manifest, ManifestStore, ModelEntry, ModelOutcome,
    NullReporter, PendingUpdate, ProgressEvent, StaticDiskSpace, Transport, Updater, UpdaterConfig,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Harness {
    temp: TempDir,
    updater: Updater,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let cfg = UpdaterConfig::default().with_retry_delay(Duration::from_millis(1));
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&cfg).unwrap());
        let store = ManifestStore::spawn(temp.path().join("models/manifest.json")).unwrap();
        let installer = Installer::new(Arc::clone(&transport), store, temp.path().join("models"))
            .with_disk_space(Arc::new(StaticDiskSpace(FreeSpace::Known(u64::MAX))));
        let updater = Updater::new(&cfg, transport, installer);
        Self { temp, updater }
    }

    fn models(&self) -> std::path::PathBuf {
        self.temp.path().join("models")
    }
}

fn entry(version: &str, file: &str, url: Option<String>, body: Option<&[u8]>) -> ModelEntry {
    ModelEntry {
        version: version.into(),
        file: file.into(),
        sha256: body.map(sha256_bytes),
        url,
        updated_at: None,
    }
}

#[tokio::test]
async fn test_upgrade_keeps_unrelated_local_entries() {
    let mut server = Server::new_async().await;
    let _redirect = server
        .mock("GET", "/upscale/latest")
        .with_status(301)
        .with_header("location", "/blobs/upscale-1.1.0")
        .create_async()
        .await;
    let _blob = server
        .mock("GET", "/blobs/upscale-1.1.0")
        .with_status(200)
        .with_body("upscale v1.1.0")
        .create_async()
        .await;

    let h = Harness::new();
    std::fs::create_dir_all(h.models()).unwrap();
    std::fs::write(h.models().join("upscale.bin"), "upscale v1.0.0").unwrap();
    std::fs::write(h.models().join("local-only.bin"), "keep me").unwrap();

    let mut local = Manifest::empty();
    local.upsert(
        "upscale",
        entry("1.0.0", "upscale.bin", None, Some(b"upscale v1.0.0".as_slice())),
    );
    local.upsert("local-only", entry("0.1.0", "local-only.bin", None, None));
    local.save(&h.models().join("manifest.json")).unwrap();

    let mut remote = Manifest::empty();
    remote.upsert(
        "upscale",
        entry(
            "1.1.0",
            "upscale.bin",
            Some(format!("{}/upscale/latest", server.url())),
            Some(b"upscale v1.1.0".as_slice()),
        ),
    );

    let report = h
        .updater
        .update_all(&remote, &NullReporter, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.outcomes,
        vec![ModelOutcome::Updated {
            name: "upscale".into(),
            from: Some("1.0.0".into()),
            to: "1.1.0".into(),
        }]
    );
    assert_eq!(
        std::fs::read_to_string(h.models().join("upscale.bin")).unwrap(),
        "upscale v1.1.0"
    );
    assert!(!h.models().join("upscale.bin.bak").exists());

    let saved = Manifest::load(&h.models().join("manifest.json")).unwrap();
    assert_eq!(saved.get("upscale").unwrap().version, "1.1.0");
    assert_eq!(saved.get("local-only").unwrap().version, "0.1.0");
    assert!(h.models().join("local-only.bin").exists());
}

#[tokio::test]
async fn test_concurrent_installs_of_different_models() {
    let mut server = Server::new_async().await;
    let _a = server
        .mock("GET", "/a.bin")
        .with_status(200)
        .with_body(vec![b'a'; 256 * 1024])
        .create_async()
        .await;
    let _b = server
        .mock("GET", "/b.bin")
        .with_status(200)
        .with_body(vec![b'b'; 256 * 1024])
        .create_async()
        .await;

    let h = Harness::new();
    let installer = h.updater.installer().clone();
    let cancel = CancellationToken::new();

    let pending = |name: &str| PendingUpdate {
        name: name.into(),
        current_version: None,
        next_version: "1.0.0".into(),
        file: format!("{name}.bin"),
        checksum: Some(sha256_bytes(name.repeat(256 * 1024).as_bytes())),
        source_url: Some(format!("{}/{name}.bin", server.url())),
    };
    let (a, b) = (pending("a"), pending("b"));

    let quiet = |_: ProgressEvent| {};

    let (ra, rb) = tokio::join!(
        installer.install(&a, &quiet, &cancel),
        installer.install(&b, &quiet, &cancel),
    );
    ra.unwrap();
    rb.unwrap();

    let saved = h.updater.local_manifest().await.unwrap();
    assert_eq!(saved.models.len(), 2);
    assert!(saved.get("a").unwrap().updated_at.is_some());
    assert!(saved.get("b").unwrap().updated_at.is_some());
}

#[tokio::test]
async fn test_server_error_leaves_previous_install_intact() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/m.bin")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let h = Harness::new();
    std::fs::create_dir_all(h.models()).unwrap();
    std::fs::write(h.models().join("m.bin"), "v1").unwrap();
    let mut local = Manifest::empty();
    local.upsert("m", entry("1.0.0", "m.bin", None, None));
    local.save(&h.models().join("manifest.json")).unwrap();
    let before = std::fs::read(h.models().join("manifest.json")).unwrap();

    let mut remote = Manifest::empty();
    remote.upsert(
        "m",
        entry("2.0.0", "m.bin", Some(format!("{}/m.bin", server.url())), None),
    );

    let report = h
        .updater
        .update_all(&remote, &NullReporter, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!report.is_success());
    _m.assert_async().await;

    assert_eq!(std::fs::read_to_string(h.models().join("m.bin")).unwrap(), "v1");
    assert!(!h.models().join("m.bin.part").exists());
    assert!(!h.models().join("m.bin.bak").exists());
    assert_eq!(std::fs::read(h.models().join("manifest.json")).unwrap(), before);
}

#[tokio::test]
async fn test_entry_naming_the_manifest_cannot_replace_it() {
    let mut server = Server::new_async().await;
    let _evil = server
        .mock("GET", "/evil")
        .with_status(200)
        .with_body("not a manifest")
        .expect(0)
        .create_async()
        .await;

    let h = Harness::new();
    let mut local = Manifest::empty();
    local.upsert("a", entry("1.0.0", "a.bin", None, None));
    local.save(&h.models().join("manifest.json")).unwrap();
    let before = std::fs::read(h.models().join("manifest.json")).unwrap();

    let mut remote = Manifest::empty();
    remote.upsert(
        "evil",
        entry(
            "9.9.9",
            "manifest.json",
            Some(format!("{}/evil", server.url())),
            None,
        ),
    );

    let report = h
        .updater
        .update_all(&remote, &NullReporter, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        &report.outcomes[..],
        [ModelOutcome::Failed { name, kind: ErrorKind::ManifestCorrupt, .. }] if name == "evil"
    ));
    _evil.assert_async().await;
    assert_eq!(std::fs::read(h.models().join("manifest.json")).unwrap(), before);
    assert!(!h.models().join("manifest.json.bak").exists());
    assert_eq!(Manifest::load(&h.models().join("manifest.json")).unwrap(), local);
}
