//! Tests for importing remote versions into a vault
//!
//! Most scenarios use two devices: one exports, the other imports from the
//! same ledger.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use weave_core::{CipherParams, Error, FileOutcome, MetadataStore, SyncConfig, SyncEngine};
use weave_ledger::MemoryLedger;
use weave_test_utils::ledger::{connected, memory_ledger};
use weave_test_utils::{TestVault, vp};

const PASSWORD: &str = "correct horse";

fn config() -> SyncConfig {
    let mut config = SyncConfig::new("test-vault");
    config.retry.base_delay_ms = 1;
    config.cipher = CipherParams::low_cost();
    config
}

fn device(vault: &TestVault, ledger: &Arc<MemoryLedger>, password: &str) -> SyncEngine {
    SyncEngine::builder(vault.vault(), ledger.clone())
        .config(config())
        .password(password)
        .credentials(connected())
        .build()
        .unwrap()
}

/// A second device that already knows the first device's metadata, without
/// having to read the published map.
async fn seeded_device(
    source: &SyncEngine,
    vault: &TestVault,
    ledger: &Arc<MemoryLedger>,
    password: &str,
) -> SyncEngine {
    let mut store = MetadataStore::in_memory();
    store.state.remote = source.state().await.remote;
    SyncEngine::builder(vault.vault(), ledger.clone())
        .config(config())
        .password(password)
        .credentials(connected())
        .store(store)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_import_remote_only_path_creates_file() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    laptop.write("notes/deep/a.md", "# From the laptop");
    device(&laptop, &ledger, PASSWORD).export_all().await.unwrap();

    let engine = device(&phone, &ledger, PASSWORD);
    let report = engine.import_all().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.changed(), 1);
    phone.assert_file_contains("notes/deep/a.md", "# From the laptop");

    let local = engine.local_metadata(&vp("notes/deep/a.md")).await.unwrap();
    assert_eq!(Some(local), engine.remote_metadata(&vp("notes/deep/a.md")).await);
}

#[tokio::test]
async fn test_import_binary_file_roundtrips_bytes() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    let image = vec![0x89, b'P', b'N', b'G', 0x00, 0xFF, 0xFE, 0x10];
    laptop.write("assets/pic.png", &image);
    device(&laptop, &ledger, PASSWORD).export_all().await.unwrap();

    device(&phone, &ledger, PASSWORD).import_all().await.unwrap();

    assert_eq!(phone.read("assets/pic.png"), image);
}

#[tokio::test]
async fn test_import_with_wrong_password_writes_nothing() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    laptop.write("a.md", "secret");
    let source = device(&laptop, &ledger, PASSWORD);
    source.export_all().await.unwrap();

    let engine = seeded_device(&source, &phone, &ledger, "wrong password").await;
    let err = engine.import(&vp("a.md")).await.unwrap_err();

    assert!(matches!(err, Error::Decryption { ref path, .. } if path == "a.md"));
    phone.assert_file_not_exists("a.md");
    assert_eq!(engine.local_metadata(&vp("a.md")).await, None);
}

#[tokio::test]
async fn test_import_skips_identical_local_file() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    laptop.write("a.md", "same on both");
    phone.write("a.md", "same on both");
    device(&laptop, &ledger, PASSWORD).export_all().await.unwrap();

    let engine = device(&phone, &ledger, PASSWORD);
    engine.refresh_remote().await.unwrap();
    let fetches = ledger.fetch_calls();

    let outcome = engine.import(&vp("a.md")).await.unwrap();

    assert!(matches!(outcome, FileOutcome::Skipped { .. }));
    assert_eq!(ledger.fetch_calls(), fetches);
    assert!(engine.local_metadata(&vp("a.md")).await.unwrap().is_uploaded());
}

#[tokio::test]
async fn test_import_overwrites_stale_local_file() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    phone.write("a.md", "old");
    phone.age("a.md", 3600);
    laptop.write("a.md", "new");
    device(&laptop, &ledger, PASSWORD).export_all().await.unwrap();

    let engine = device(&phone, &ledger, PASSWORD);
    engine.refresh_remote().await.unwrap();
    assert_eq!(
        engine.check(&vp("a.md")).await.unwrap().status,
        weave_core::SyncStatus::RemoteNewer
    );

    engine.import(&vp("a.md")).await.unwrap();

    assert_eq!(phone.read_text("a.md"), "new");
    assert_eq!(
        engine.check(&vp("a.md")).await.unwrap().status,
        weave_core::SyncStatus::Synced
    );
}

#[tokio::test]
async fn test_fetch_succeeds_when_two_of_three_attempts_fail() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    laptop.write("a.md", "persistent");
    device(&laptop, &ledger, PASSWORD).export_all().await.unwrap();

    let engine = device(&phone, &ledger, PASSWORD);
    engine.refresh_remote().await.unwrap();
    ledger.fail_next_fetches(2);
    let before = ledger.fetch_calls();

    let outcome = engine.import(&vp("a.md")).await.unwrap();

    assert!(matches!(outcome, FileOutcome::Imported { version_number: 1, .. }));
    assert_eq!(ledger.fetch_calls() - before, 3);
    phone.assert_file_contains("a.md", "persistent");
}

#[tokio::test]
async fn test_three_fetch_failures_is_network_fetch_error() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    laptop.write("a.md", "unreachable");
    device(&laptop, &ledger, PASSWORD).export_all().await.unwrap();

    let engine = device(&phone, &ledger, PASSWORD);
    engine.refresh_remote().await.unwrap();
    ledger.fail_next_fetches(3);

    let err = engine.import(&vp("a.md")).await.unwrap_err();

    assert!(matches!(err, Error::NetworkFetch { attempts: 3, .. }));
    phone.assert_file_not_exists("a.md");
}

#[tokio::test]
async fn test_import_batch_collects_failures() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    laptop.write("a.md", "a");
    laptop.write("b.md", "b");
    device(&laptop, &ledger, PASSWORD).export_all().await.unwrap();

    let engine = device(&phone, &ledger, PASSWORD);
    engine.refresh_remote().await.unwrap();
    ledger.fail_next_fetches(3);

    let report = engine.import_paths(&[vp("a.md"), vp("b.md")]).await;

    assert_eq!(report.summary(), "1 of 2 succeeded");
    assert!(matches!(
        report.outcome(&vp("a.md")),
        Some(FileOutcome::Failed(Error::NetworkFetch { .. }))
    ));
    phone.assert_file_contains("b.md", "b");
    assert!(matches!(
        report.into_result(),
        Err(Error::Batch { succeeded: 1, total: 2, .. })
    ));
}

#[tokio::test]
async fn test_import_untracked_path_is_file_not_found() {
    let ledger = memory_ledger();
    let phone = TestVault::new();
    let engine = device(&phone, &ledger, PASSWORD);

    let err = engine.import(&vp("ghost.md")).await.unwrap_err();

    assert!(matches!(err, Error::FileNotFound { .. }));
}

#[tokio::test]
async fn test_imported_file_then_reexport_is_noop() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    laptop.write("a.md", "shared");
    device(&laptop, &ledger, PASSWORD).export_all().await.unwrap();

    let engine = device(&phone, &ledger, PASSWORD);
    engine.import_all().await.unwrap();
    let records = ledger.len();

    let report = engine.export_all().await.unwrap();

    assert_eq!(report.changed(), 0);
    assert_eq!(ledger.len(), records);
}

#[tokio::test]
async fn test_hidden_path_in_remote_map_is_refused() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    laptop.write("a.md", "harmless");
    let source = device(&laptop, &ledger, PASSWORD);
    source.export_all().await.unwrap();

    let mut store = MetadataStore::in_memory();
    store.state.remote = source.state().await.remote;
    store.state.remote.rename(&vp("a.md"), &vp(".weave/config.toml"));
    let engine = SyncEngine::builder(phone.vault(), ledger.clone())
        .config(config())
        .password(PASSWORD)
        .credentials(connected())
        .store(store)
        .build()
        .unwrap();

    let err = engine.import(&vp(".weave/config.toml")).await.unwrap_err();

    assert!(matches!(err, Error::Fs(weave_fs::Error::InvalidPath { .. })));
    phone.assert_file_not_exists(".weave/config.toml");
}
