//! Error types for weave-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from weave-core
    #[error(transparent)]
    Core(#[from] weave_core::Error),

    /// Error from weave-fs
    #[error(transparent)]
    Fs(#[from] weave_fs::Error),

    /// Error from weave-ledger
    #[error(transparent)]
    Ledger(#[from] weave_ledger::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}
