//! Sync scenarios
//!
//! Each test walks one user-visible scenario from a clean vault to the
//! expected ledger and disk state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use weave_core::{CipherParams, Error, FileOutcome, SyncConfig, SyncEngine, SyncStatus};
use weave_ledger::record::tag;
use weave_ledger::{CredentialProvider, LedgerQuery, MemoryLedger, RecordType, Tag};
use weave_test_utils::ledger::{connected, memory_ledger};
use weave_test_utils::{TestVault, vp};

fn config(base_delay_ms: u64) -> SyncConfig {
    let mut config = SyncConfig::new("scenarios");
    config.retry.base_delay_ms = base_delay_ms;
    config.cipher = CipherParams::low_cost();
    config
}

fn signed_device(
    vault: &TestVault,
    ledger: &Arc<MemoryLedger>,
    password: &str,
    credentials: Arc<CredentialProvider>,
) -> SyncEngine {
    SyncEngine::builder(vault.vault(), ledger.clone())
        .config(config(1))
        .password(password)
        .credentials(credentials)
        .build()
        .unwrap()
}

fn device_with(vault: &TestVault, ledger: &Arc<MemoryLedger>, base_delay_ms: u64) -> SyncEngine {
    SyncEngine::builder(vault.vault(), ledger.clone())
        .config(config(base_delay_ms))
        .password("pw")
        .credentials(connected())
        .build()
        .unwrap()
}

fn device(vault: &TestVault, ledger: &Arc<MemoryLedger>) -> SyncEngine {
    device_with(vault, ledger, 1)
}

fn file_versions(ledger: &MemoryLedger) -> usize {
    ledger
        .headers(&[Tag::new(tag::RECORD_TYPE, RecordType::FileVersion.as_str())])
        .len()
}

#[tokio::test]
async fn test_first_export_starts_a_chain() {
    let ledger = memory_ledger();
    let vault = TestVault::new();
    vault.write("notes/a.md", "hello");
    let engine = device(&vault, &ledger);

    let verdict = engine.check(&vp("notes/a.md")).await.unwrap();
    assert_eq!(verdict.status, SyncStatus::NewFile);

    let FileOutcome::Exported { id, version_number } =
        engine.export(&vp("notes/a.md")).await.unwrap()
    else {
        panic!("expected an export");
    };
    assert_eq!(version_number, 1);
    let header = ledger.resolve(&id).await.unwrap().unwrap();
    assert_eq!(header.tags.get(tag::PREVIOUS_VERSION), None);
    assert_eq!(header.tags.get(tag::FILE_PATH), Some("notes/a.md"));
}

#[tokio::test]
async fn test_unchanged_file_exports_nothing() {
    let ledger = memory_ledger();
    let vault = TestVault::new();
    vault.write("a.md", "steady");
    let engine = device(&vault, &ledger);
    engine.export_all().await.unwrap();

    // Touching the file without changing it keeps it synced
    vault.write_newer("a.md", "steady", 120);
    let report = engine.export_all().await.unwrap();

    assert_eq!(report.changed(), 0);
    assert_eq!(file_versions(&ledger), 1);
    assert_eq!(
        engine.check(&vp("a.md")).await.unwrap().status,
        SyncStatus::Synced
    );
}

#[tokio::test]
async fn test_wrong_password_import_leaves_vault_untouched() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    laptop.write("secret.md", "classified");
    let key = connected();
    signed_device(&laptop, &ledger, "pw", key.clone())
        .export_all()
        .await
        .unwrap();

    // Same signing key on the phone, mistyped password
    let phone = TestVault::new();
    let err = signed_device(&phone, &ledger, "guess", key)
        .import_all()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decryption { .. }));
    phone.assert_file_not_exists("secret.md");
}

#[tokio::test]
async fn test_strangers_sharing_a_vault_name_stay_apart() {
    let ledger = memory_ledger();
    let alice_vault = TestVault::new();
    let bob_vault = TestVault::new();
    alice_vault.write("alice.md", "alice's notes");
    bob_vault.write("bob.md", "bob's notes");
    let alice = signed_device(&alice_vault, &ledger, "alice pw", connected());
    let bob = signed_device(&bob_vault, &ledger, "bob pw", connected());

    alice.export_all().await.unwrap();
    let report = bob.export_all().await.unwrap();
    assert!(report.publish_error.is_none());

    alice.import_all().await.unwrap();
    bob.import_all().await.unwrap();

    assert!(alice.remote_metadata(&vp("alice.md")).await.is_some());
    assert!(alice.remote_metadata(&vp("bob.md")).await.is_none());
    assert!(bob.remote_metadata(&vp("alice.md")).await.is_none());
    alice_vault.assert_file_not_exists("bob.md");
    bob_vault.assert_file_not_exists("alice.md");

    // A second device of Alice's with its own key still follows her map
    let tablet_vault = TestVault::new();
    signed_device(&tablet_vault, &ledger, "alice pw", connected())
        .import_all()
        .await
        .unwrap();
    tablet_vault.assert_file_contains("alice.md", "alice's notes");
}

#[tokio::test]
async fn test_flaky_ledger_recovers_within_budget() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    laptop.write("a.md", "eventually");
    device(&laptop, &ledger).export_all().await.unwrap();

    let phone = TestVault::new();
    let engine = device(&phone, &ledger);
    engine.refresh_remote().await.unwrap();

    ledger.fail_next_fetches(2);
    engine.import(&vp("a.md")).await.unwrap();
    phone.assert_file_contains("a.md", "eventually");

    phone.remove("a.md");
    ledger.fail_next_fetches(3);
    let err = engine.import(&vp("a.md")).await.unwrap_err();
    assert!(matches!(err, Error::NetworkFetch { attempts: 3, .. }));
}

#[tokio::test]
async fn test_cancel_interrupts_retry_wait() {
    let ledger = memory_ledger();
    let laptop = TestVault::new();
    laptop.write("a.md", "slow");
    device(&laptop, &ledger).export_all().await.unwrap();

    let phone = TestVault::new();
    let engine = device_with(&phone, &ledger, 10_000);
    engine.refresh_remote().await.unwrap();
    ledger.fail_next_fetches(3);

    let token = engine.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = Instant::now();
    let err = engine.import(&vp("a.md")).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
    phone.assert_file_not_exists("a.md");
}
