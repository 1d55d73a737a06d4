//! Tests for connection handling, vault events and status reporting

use std::sync::Arc;

use pretty_assertions::assert_eq;
use weave_core::{CipherParams, MetadataStore, SyncConfig, SyncEngine, SyncStatus};
use weave_ledger::{ConnectionState, Credential, CredentialProvider, MemoryLedger};
use weave_test_utils::ledger::{connected, disconnected, memory_ledger};
use weave_test_utils::{TestVault, vp};

fn config() -> SyncConfig {
    let mut config = SyncConfig::new("test-vault");
    config.retry.base_delay_ms = 1;
    config.cipher = CipherParams::low_cost();
    config
}

fn engine_with(
    vault: &TestVault,
    ledger: &Arc<MemoryLedger>,
    credentials: Arc<CredentialProvider>,
    store: MetadataStore,
) -> SyncEngine {
    SyncEngine::builder(vault.vault(), ledger.clone())
        .config(config())
        .password("pw")
        .credentials(credentials)
        .store(store)
        .build()
        .unwrap()
}

fn device(vault: &TestVault, ledger: &Arc<MemoryLedger>) -> SyncEngine {
    engine_with(vault, ledger, connected(), MetadataStore::in_memory())
}

#[tokio::test]
async fn test_connect_merges_remote_map_into_local() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    let phone = TestVault::new();
    laptop.write("a.md", "a");
    let source = device(&laptop, &ledger);
    source.export_all().await.unwrap();

    let credentials = disconnected();
    let engine = engine_with(&phone, &ledger, credentials.clone(), MetadataStore::in_memory());
    let mut changes = credentials.subscribe();

    let credential = Credential::generate();
    let address = credential.address().to_string();
    let state = engine.connect(credential).await.unwrap();

    assert_eq!(state, ConnectionState::Connected { address });
    assert!(changes.has_changed().unwrap());
    assert_eq!(
        engine.local_metadata(&vp("a.md")).await,
        source.local_metadata(&vp("a.md")).await
    );
    assert!(engine.remote_metadata(&vp("a.md")).await.is_some());

    assert_eq!(engine.disconnect(), ConnectionState::Disconnected);
    assert!(!credentials.is_connected());
}

#[tokio::test]
async fn test_connect_keeps_newer_local_entries() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    laptop.write("a.md", "a");
    let source = device(&laptop, &ledger);
    source.export_all().await.unwrap();

    let phone = TestVault::new();
    let mut store = MetadataStore::in_memory();
    let mut newer = source.local_metadata(&vp("a.md")).await.unwrap();
    newer.timestamp += 60_000;
    newer.identifier = Some("local-only".into());
    store.state.local.insert(newer);
    let engine = engine_with(&phone, &ledger, disconnected(), store);

    engine.connect(Credential::generate()).await.unwrap();

    let local = engine.local_metadata(&vp("a.md")).await.unwrap();
    assert_eq!(local.identifier.as_deref(), Some("local-only"));
}

#[tokio::test]
async fn test_rename_moves_entries_and_republishes() {
    let ledger = memory_ledger();
    let vault = TestVault::new();
    vault.write("a.md", "a");
    let engine = device(&vault, &ledger);
    engine.export_all().await.unwrap();

    std::fs::create_dir_all(vault.root().join("archive")).unwrap();
    std::fs::rename(vault.root().join("a.md"), vault.root().join("archive/a.md")).unwrap();
    engine.rename(&vp("a.md"), &vp("archive/a.md")).await.unwrap();

    assert_eq!(engine.local_metadata(&vp("a.md")).await, None);
    let moved = engine.remote_metadata(&vp("archive/a.md")).await.unwrap();
    assert_eq!(moved.path, vp("archive/a.md"));
    assert_eq!(engine.check(&vp("archive/a.md")).await.unwrap().status, SyncStatus::Synced);

    let other_vault = TestVault::new();
    let other = device(&other_vault, &ledger);
    other.refresh_remote().await.unwrap();
    assert!(other.remote_metadata(&vp("archive/a.md")).await.is_some());
    assert!(other.remote_metadata(&vp("a.md")).await.is_none());
}

#[tokio::test]
async fn test_delete_forgets_both_entries() {
    let ledger = memory_ledger();
    let vault = TestVault::new();
    vault.write("a.md", "a");
    let engine = device(&vault, &ledger);
    engine.export_all().await.unwrap();

    vault.remove("a.md");
    engine.delete(&vp("a.md")).await.unwrap();

    assert_eq!(engine.local_metadata(&vp("a.md")).await, None);
    assert_eq!(engine.remote_metadata(&vp("a.md")).await, None);

    let other_vault = TestVault::new();
    let other = device(&other_vault, &ledger);
    other.refresh_remote().await.unwrap();
    assert!(other.state().await.remote.is_empty());
}

#[tokio::test]
async fn test_rename_into_hidden_directory_drops_the_file() {
    let ledger = memory_ledger();
    let vault = TestVault::new();
    vault.write("a.md", "a");
    let engine = device(&vault, &ledger);
    engine.export_all().await.unwrap();

    std::fs::create_dir_all(vault.root().join(".trash")).unwrap();
    std::fs::rename(vault.root().join("a.md"), vault.root().join(".trash/a.md")).unwrap();
    engine.rename(&vp("a.md"), &vp(".trash/a.md")).await.unwrap();

    assert_eq!(engine.remote_metadata(&vp("a.md")).await, None);
    assert_eq!(engine.remote_metadata(&vp(".trash/a.md")).await, None);
    assert_eq!(engine.local_metadata(&vp(".trash/a.md")).await, None);
}

#[tokio::test]
async fn test_record_local_change_tracks_pending_file() {
    let ledger = memory_ledger();
    let vault = TestVault::new();
    let engine = device(&vault, &ledger);
    vault.write("draft.md", "wip");

    let verdict = engine.record_local_change(&vp("draft.md")).await.unwrap();

    assert_eq!(verdict.status, SyncStatus::NewFile);
    let local = engine.local_metadata(&vp("draft.md")).await.unwrap();
    assert!(!local.is_uploaded());
    assert_eq!(local.content_hash, verdict.content_hash);
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_status_reports_every_state() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    laptop.write("synced.md", "same");
    laptop.write("stale.md", "laptop edit");
    laptop.write("edited.md", "original");
    laptop.write("remote-only.md", "only here");
    device(&laptop, &ledger).export_all().await.unwrap();

    let phone = TestVault::new();
    phone.write("synced.md", "same");
    phone.write("stale.md", "old phone copy");
    phone.age("stale.md", 3600);
    phone.write_newer("edited.md", "phone edit", 3600);
    phone.write("new.md", "brand new");
    let engine = device(&phone, &ledger);
    engine.refresh_remote().await.unwrap();

    let status = engine.status().await.unwrap();
    let by_path = |path: &str| {
        status
            .files
            .iter()
            .find(|v| v.path == vp(path))
            .map(|v| v.status)
    };

    assert_eq!(by_path("synced.md"), Some(SyncStatus::Synced));
    assert_eq!(by_path("stale.md"), Some(SyncStatus::RemoteNewer));
    assert_eq!(by_path("edited.md"), Some(SyncStatus::UpdatedFile));
    assert_eq!(by_path("new.md"), Some(SyncStatus::NewFile));
    assert_eq!(status.remote_only, vec![vp("remote-only.md")]);
    assert!(!status.is_synced());
    assert_eq!(status.count(SyncStatus::Synced), 1);
}

#[tokio::test]
async fn test_state_survives_engine_restart() {
    let ledger = memory_ledger();
    let vault = TestVault::new();
    vault.write("a.md", "a");
    let root = vault.normalized_root();

    {
        let store = MetadataStore::open(&root).unwrap();
        let engine = engine_with(&vault, &ledger, connected(), store);
        engine.export_all().await.unwrap();
    }
    vault.assert_file_exists(".weave/state.json");

    let store = MetadataStore::open(&root).unwrap();
    let engine = engine_with(&vault, &ledger, connected(), store);

    assert_eq!(engine.check(&vp("a.md")).await.unwrap().status, SyncStatus::Synced);
    let status = engine.status().await.unwrap();
    assert_eq!(status.files.len(), 1);
}
