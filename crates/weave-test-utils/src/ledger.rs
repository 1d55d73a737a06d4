//! Ledger fixtures.
//!
//! Choose [`memory_ledger`] unless the test needs records to outlive the
//! process or be shared through the filesystem.

use std::sync::Arc;

use tempfile::TempDir;
use weave_ledger::{Credential, CredentialProvider, DirLedger, MemoryLedger};

/// An empty in-process ledger.
pub fn memory_ledger() -> Arc<MemoryLedger> {
    Arc::new(MemoryLedger::new())
}

/// A directory ledger in its own temporary directory. Keep the `TempDir`
/// alive for as long as the ledger is used.
pub fn dir_ledger() -> (TempDir, Arc<DirLedger>) {
    let temp = TempDir::new().unwrap();
    let ledger = DirLedger::open(temp.path()).unwrap();
    (temp, Arc::new(ledger))
}

/// A provider holding a freshly generated credential.
pub fn connected() -> Arc<CredentialProvider> {
    Arc::new(CredentialProvider::with_credential(Credential::generate()))
}

/// A provider with nothing loaded.
pub fn disconnected() -> Arc<CredentialProvider> {
    Arc::new(CredentialProvider::new())
}
