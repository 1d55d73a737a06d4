//! Per-path serialization

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use weave_fs::VaultPath;

/// Hands out one async lock per vault path so at most one sync runs for a
/// path at a time.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<VaultPath, Arc<AsyncMutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`.
    pub async fn lock(&self, path: &VaultPath) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Held or awaited locks have outstanding clones
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(path.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of paths currently holding a lock entry.
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
