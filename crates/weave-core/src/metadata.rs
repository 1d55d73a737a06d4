//! Per-file sync metadata
//!
//! Every tracked path has two entries: `local` (what this device last
//! exported or imported) and `remote` (what the ledger's published map
//! says). The evaluator reads the divergence between the two.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use weave_fs::{ConfigStore, NormalizedPath, VaultPath};

use crate::Result;
use crate::config::{STATE_DIR, STATE_FILE};

/// What is known about one version of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSyncMetadata {
    /// Ledger record of the current version; `None` until first upload
    pub identifier: Option<String>,
    /// Last known change, ms since epoch
    pub timestamp: i64,
    pub content_hash: String,
    pub encrypted: bool,
    pub path: VaultPath,
    pub previous_version_id: Option<String>,
    pub version_number: u32,
}

impl FileSyncMetadata {
    /// Entry for a file that has changed locally but not been uploaded.
    pub fn pending(path: VaultPath, content_hash: String, timestamp: i64, encrypted: bool) -> Self {
        Self {
            identifier: None,
            timestamp,
            content_hash,
            encrypted,
            path,
            previous_version_id: None,
            version_number: 0,
        }
    }

    /// Whether this entry points at an uploaded record.
    pub fn is_uploaded(&self) -> bool {
        self.identifier.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Path-keyed metadata entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataMap(BTreeMap<VaultPath, FileSyncMetadata>);

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &VaultPath) -> Option<&FileSyncMetadata> {
        self.0.get(path)
    }

    pub fn contains(&self, path: &VaultPath) -> bool {
        self.0.contains_key(path)
    }

    pub fn insert(&mut self, meta: FileSyncMetadata) -> Option<FileSyncMetadata> {
        self.0.insert(meta.path.clone(), meta)
    }

    pub fn remove(&mut self, path: &VaultPath) -> Option<FileSyncMetadata> {
        self.0.remove(path)
    }

    /// Move the entry at `from` to `to`, rewriting its `path` field.
    /// Returns false when there was nothing to move.
    pub fn rename(&mut self, from: &VaultPath, to: &VaultPath) -> bool {
        match self.0.remove(from) {
            Some(mut meta) => {
                meta.path = to.clone();
                self.0.insert(to.clone(), meta);
                true
            }
            None => false,
        }
    }

    /// Take every entry of `other` that is absent here or carries a later
    /// timestamp. Returns the paths that changed.
    pub fn merge_newer(&mut self, other: &MetadataMap) -> Vec<VaultPath> {
        let mut changed = Vec::new();
        for (path, theirs) in &other.0 {
            let take = match self.0.get(path) {
                Some(ours) => theirs.timestamp > ours.timestamp,
                None => true,
            };
            if take {
                self.0.insert(path.clone(), theirs.clone());
                changed.push(path.clone());
            }
        }
        changed
    }

    pub fn paths(&self) -> impl Iterator<Item = &VaultPath> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VaultPath, &FileSyncMetadata)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Both metadata copies, as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncState {
    pub local: MetadataMap,
    pub remote: MetadataMap,
}

/// [`SyncState`] bound to its file.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: Option<NormalizedPath>,
    pub state: SyncState,
}

impl MetadataStore {
    /// Load `.weave/state.json` under `root`, starting empty if absent.
    pub fn open(root: &NormalizedPath) -> Result<Self> {
        let path = root.join(STATE_DIR).join(STATE_FILE);
        let state = ConfigStore::new().load_or_default(&path)?;
        Ok(Self {
            path: Some(path),
            state,
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: SyncState::default(),
        }
    }

    pub fn location(&self) -> Option<&NormalizedPath> {
        self.path.as_ref()
    }

    /// Write the current state atomically.
    pub fn persist(&self) -> Result<()> {
        if let Some(path) = &self.path {
            ConfigStore::new().save(path, &self.state)?;
            tracing::debug!(
                path = %path,
                local = self.state.local.len(),
                remote = self.state.remote.len(),
                "sync state persisted"
            );
        }
        Ok(())
    }

    /// Drop both entries for `path`.
    pub fn forget(&mut self, path: &VaultPath) {
        self.state.local.remove(path);
        self.state.remote.remove(path);
    }
}
