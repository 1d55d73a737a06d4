//! End-to-end integration tests over a directory ledger
//!
//! Two vaults on "different devices" share one ledger directory and persist
//! their metadata under `.weave/`, the way the CLI runs them.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use weave_core::{CipherParams, MetadataStore, SyncConfig, SyncEngine, SyncStatus};
use weave_ledger::{Credential, CredentialProvider, DirLedger};
use weave_test_utils::ledger::{connected, dir_ledger, disconnected};
use weave_test_utils::{TestVault, vp};

const PASSWORD: &str = "shared secret";

fn config(vault_name: &str) -> SyncConfig {
    let mut config = SyncConfig::new(vault_name);
    config.retry.base_delay_ms = 1;
    config.cipher = CipherParams::low_cost();
    config
}

fn device(
    vault: &TestVault,
    ledger: &Arc<DirLedger>,
    credentials: Arc<CredentialProvider>,
    vault_name: &str,
) -> SyncEngine {
    let store = MetadataStore::open(&vault.normalized_root()).unwrap();
    SyncEngine::builder(vault.vault(), ledger.clone())
        .config(config(vault_name))
        .password(PASSWORD)
        .credentials(credentials)
        .store(store)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_two_devices_edit_the_same_file() {
    let (_dir, ledger) = dir_ledger();
    let laptop_vault = TestVault::new();
    let phone_vault = TestVault::new();

    laptop_vault.write("notes/a.md", "written on the laptop");
    let laptop = device(&laptop_vault, &ledger, connected(), "notes");
    let report = laptop.export_all().await.unwrap();
    assert_eq!(report.summary(), "1 of 1 succeeded");

    // Phone joins later and picks up the laptop's map when it connects
    let phone = device(&phone_vault, &ledger, disconnected(), "notes");
    phone.connect(Credential::generate()).await.unwrap();
    let report = phone.import_all().await.unwrap();
    assert_eq!(report.changed(), 1);
    phone_vault.assert_file_contains("notes/a.md", "written on the laptop");

    phone_vault.write_newer("notes/a.md", "edited on the phone", 60);
    assert_eq!(
        phone.check(&vp("notes/a.md")).await.unwrap().status,
        SyncStatus::UpdatedFile
    );
    phone.export(&vp("notes/a.md")).await.unwrap();

    laptop.refresh_remote().await.unwrap();
    assert_eq!(
        laptop.check(&vp("notes/a.md")).await.unwrap().status,
        SyncStatus::RemoteNewer
    );
    laptop.import(&vp("notes/a.md")).await.unwrap();
    assert_eq!(laptop_vault.read_text("notes/a.md"), "edited on the phone");

    let history = laptop.history(&vp("notes/a.md"), 5).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].tags.version_number, 2);
    assert_eq!(
        history[0].tags.previous_version_id.as_deref(),
        Some(history[1].id.as_str())
    );
}

#[tokio::test]
async fn test_state_and_ledger_survive_restart() {
    let (dir, ledger) = dir_ledger();
    let vault = TestVault::new();
    vault.write("a.md", "v1");
    let credentials = connected();
    {
        let engine = device(&vault, &ledger, credentials.clone(), "notes");
        engine.export_all().await.unwrap();
        vault.write_newer("a.md", "v2", 30);
        engine.export(&vp("a.md")).await.unwrap();
    }
    drop(ledger);

    let reopened = Arc::new(DirLedger::open(dir.path()).unwrap());
    let engine = device(&vault, &reopened, credentials, "notes");

    assert_eq!(
        engine.check(&vp("a.md")).await.unwrap().status,
        SyncStatus::Synced
    );
    let previous = engine
        .previous_version_plaintext(&vp("a.md"), 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(previous.as_bytes(), b"v1");
    assert!(engine.refresh_remote().await.unwrap());
}

#[tokio::test]
async fn test_vaults_sharing_a_ledger_stay_separate() {
    let (_dir, ledger) = dir_ledger();
    let work_vault = TestVault::new();
    let home_vault = TestVault::new();
    work_vault.write("plan.md", "quarterly plan");

    device(&work_vault, &ledger, connected(), "work")
        .export_all()
        .await
        .unwrap();

    let home = device(&home_vault, &ledger, connected(), "home");
    assert!(!home.refresh_remote().await.unwrap());
    assert!(home.import_all().await.unwrap().files.is_empty());
    home_vault.assert_file_not_exists("plan.md");
}

#[tokio::test]
async fn test_rename_on_one_device_moves_file_on_the_other() {
    let (_dir, ledger) = dir_ledger();
    let laptop_vault = TestVault::new();
    let phone_vault = TestVault::new();
    laptop_vault.write("inbox/idea.md", "an idea");
    let laptop = device(&laptop_vault, &ledger, connected(), "notes");
    laptop.export_all().await.unwrap();

    std::fs::create_dir_all(laptop_vault.root().join("projects")).unwrap();
    std::fs::rename(
        laptop_vault.root().join("inbox/idea.md"),
        laptop_vault.root().join("projects/idea.md"),
    )
    .unwrap();
    laptop
        .rename(&vp("inbox/idea.md"), &vp("projects/idea.md"))
        .await
        .unwrap();

    let phone = device(&phone_vault, &ledger, connected(), "notes");
    phone.import_all().await.unwrap();

    phone_vault.assert_file_contains("projects/idea.md", "an idea");
    phone_vault.assert_file_not_exists("inbox/idea.md");
}
