//! Sync-state evaluation
//!
//! Decides, for one path, whether the local file and its remote counterpart
//! agree. Pure: evaluated fresh on every call from the inputs given.

use std::fmt;

use serde::{Deserialize, Serialize};
use weave_fs::VaultPath;

use crate::metadata::FileSyncMetadata;

/// Relationship between a local file and its remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    /// Nothing has been uploaded for this path
    NewFile,
    /// Local content differs and is newer than the remote version
    UpdatedFile,
    /// Remote content differs and is at least as new as the local file
    RemoteNewer,
    /// Local content matches the remote version
    Synced,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewFile => "new-file",
            Self::UpdatedFile => "updated-file",
            Self::RemoteNewer => "remote-newer",
            Self::Synced => "synced",
        }
    }

    /// Whether an export would upload something.
    pub fn needs_export(&self) -> bool {
        matches!(self, Self::NewFile | Self::UpdatedFile)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncVerdict {
    pub path: VaultPath,
    pub status: SyncStatus,
    pub local_newer: bool,
    /// Hash of the content as it is on disk right now
    pub content_hash: String,
    pub local_version: Option<u32>,
    pub remote_version: Option<u32>,
}

/// Evaluate the sync state of `path`.
///
/// A remote entry without a record identifier counts as absent.
pub fn evaluate(
    path: &VaultPath,
    local: Option<&FileSyncMetadata>,
    remote: Option<&FileSyncMetadata>,
    content_hash: &str,
    local_modified_ms: i64,
) -> SyncVerdict {
    let remote = remote.filter(|meta| meta.is_uploaded());

    let (status, local_newer) = match remote {
        None => (SyncStatus::NewFile, true),
        Some(meta) if meta.content_hash == content_hash => (SyncStatus::Synced, false),
        Some(meta) if local_modified_ms > meta.timestamp => (SyncStatus::UpdatedFile, true),
        Some(_) => (SyncStatus::RemoteNewer, false),
    };

    SyncVerdict {
        path: path.clone(),
        status,
        local_newer,
        content_hash: content_hash.to_string(),
        local_version: local.map(|meta| meta.version_number),
        remote_version: remote.map(|meta| meta.version_number),
    }
}
