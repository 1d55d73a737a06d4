//! Error types for weave-core

use crate::cipher::CipherError;

/// Result type for weave-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while syncing a vault
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation that signs records ran without a connected credential
    #[error("No wallet connected; connect a signing key before exporting")]
    NoWallet,

    /// Encryption is enabled but no password was supplied
    #[error("Encryption is enabled but no password was provided")]
    PasswordRequired,

    /// The ledger refused or failed to accept a version
    #[error("Upload of {path} failed: {message}")]
    Upload { path: String, message: String },

    /// A payload could not be decrypted
    #[error("Failed to decrypt {path}: {source}")]
    Decryption {
        path: String,
        #[source]
        source: CipherError,
    },

    /// Content could not be encrypted
    #[error("Failed to encrypt {path}: {source}")]
    Encryption {
        path: String,
        #[source]
        source: CipherError,
    },

    /// Fetching a record payload failed after every retry
    #[error("Failed to fetch record {id} after {attempts} attempts: {message}")]
    NetworkFetch {
        id: String,
        attempts: u32,
        message: String,
    },

    /// A version chain link points at a record that does not exist.
    /// Never surfaced by history walks, which yield `None` instead.
    #[error("Version chain for {path} is broken at {id}")]
    ChainIntegrity { path: String, id: String },

    /// Written content does not match the hash recorded for it
    #[error("Content hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// The path is not tracked locally or remotely
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Some files in a batch failed
    #[error("{succeeded} of {total} succeeded; failures: {}", format_failures(.failures))]
    Batch {
        succeeded: usize,
        total: usize,
        failures: Vec<(String, String)>,
    },

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Fs(#[from] weave_fs::Error),

    #[error(transparent)]
    Ledger(#[from] weave_ledger::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(path, message)| format!("{path}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Translate a payload fetch failure into the error reported to callers.
    pub(crate) fn from_fetch(id: &str, err: weave_ledger::Error) -> Self {
        match err {
            weave_ledger::Error::RetriesExhausted {
                attempts, source, ..
            } => Self::NetworkFetch {
                id: id.to_string(),
                attempts,
                message: source.to_string(),
            },
            weave_ledger::Error::Cancelled => Self::Cancelled,
            other => Self::Ledger(other),
        }
    }

    /// The file path this error is about, when it names one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Upload { path, .. }
            | Self::Decryption { path, .. }
            | Self::Encryption { path, .. }
            | Self::ChainIntegrity { path, .. }
            | Self::HashMismatch { path, .. }
            | Self::FileNotFound { path } => Some(path),
            _ => None,
        }
    }
}
