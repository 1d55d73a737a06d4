//! Batch results
//!
//! Import and export never stop at the first failing file. Each file gets a
//! [`FileReport`]; the caller decides whether failures are fatal.

use std::fmt;

use serde::Serialize;
use weave_fs::VaultPath;

use crate::Error;
use crate::evaluate::{SyncStatus, SyncVerdict};

/// What happened to one file.
#[derive(Debug)]
pub enum FileOutcome {
    /// A new version was uploaded
    Exported { id: String, version_number: u32 },
    /// The remote version was written to disk
    Imported { id: String, version_number: u32 },
    /// Nothing to do
    Skipped { reason: String },
    Failed(Error),
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exported { id, version_number } => write!(f, "exported v{version_number} ({id})"),
            Self::Imported { id, version_number } => write!(f, "imported v{version_number} ({id})"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Outcome for one path in a batch.
#[derive(Debug)]
pub struct FileReport {
    pub path: VaultPath,
    pub outcome: FileOutcome,
}

/// Report from an import or export batch
#[derive(Debug, Default)]
pub struct SyncReport {
    pub files: Vec<FileReport>,
    /// Identifier of the remote map published at the end of the batch
    pub published: Option<String>,
    /// Set when the end-of-batch publish failed
    pub publish_error: Option<Error>,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: VaultPath, outcome: FileOutcome) {
        if let FileOutcome::Failed(e) = &outcome {
            tracing::warn!(path = %path, error = %e, "file failed");
        }
        self.files.push(FileReport { path, outcome });
    }

    pub fn total(&self) -> usize {
        self.files.len()
    }

    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| !f.outcome.is_failure()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&VaultPath, &Error)> {
        self.files.iter().filter_map(|f| match &f.outcome {
            FileOutcome::Failed(e) => Some((&f.path, e)),
            _ => None,
        })
    }

    /// Files that were uploaded or written.
    pub fn changed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| {
                matches!(
                    f.outcome,
                    FileOutcome::Exported { .. } | FileOutcome::Imported { .. }
                )
            })
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none() && self.publish_error.is_none()
    }

    /// "N of M succeeded"
    pub fn summary(&self) -> String {
        format!("{} of {} succeeded", self.succeeded(), self.total())
    }

    /// Outcome for `path`, if it was part of the batch.
    pub fn outcome(&self, path: &VaultPath) -> Option<&FileOutcome> {
        self.files.iter().find(|f| &f.path == path).map(|f| &f.outcome)
    }

    /// Fold failures into a single [`Error::Batch`].
    pub fn into_result(self) -> Result<Self, Error> {
        if self.is_success() {
            return Ok(self);
        }
        let mut failures: Vec<(String, String)> = self
            .failures()
            .map(|(path, e)| (path.to_string(), e.to_string()))
            .collect();
        if let Some(e) = &self.publish_error {
            failures.push(("vault-config".to_string(), e.to_string()));
        }
        Err(Error::Batch {
            succeeded: self.succeeded(),
            total: self.total(),
            failures,
        })
    }
}

/// Sync state of the whole vault.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// One verdict per local file, sorted by path
    pub files: Vec<SyncVerdict>,
    /// Paths with a remote version but no local file
    pub remote_only: Vec<VaultPath>,
}

impl StatusReport {
    pub fn count(&self, status: SyncStatus) -> usize {
        self.files.iter().filter(|v| v.status == status).count()
    }

    /// True when every local file is synced and nothing awaits import.
    pub fn is_synced(&self) -> bool {
        self.remote_only.is_empty() && self.files.iter().all(|v| v.status == SyncStatus::Synced)
    }
}
