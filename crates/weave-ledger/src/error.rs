//! Error types for weave-ledger

/// Result type for weave-ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur talking to a ledger
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure; worth retrying
    #[error("Network error: {message}")]
    Network { message: String },

    /// No record exists with the given identifier
    #[error("Record not found: {id}")]
    NotFound { id: String },

    /// A record exists but its tags cannot be interpreted
    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    /// An append-only invariant would be violated
    #[error("Record {id} already exists")]
    AlreadyExists { id: String },

    /// No signing credential is loaded
    #[error("No signing credential is connected")]
    NoCredential,

    /// Credential material could not be loaded
    #[error("Invalid credential: {message}")]
    InvalidCredential { message: String },

    /// Transient failures persisted through every attempt
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// The caller cancelled a retry loop
    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Fs(#[from] weave_fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Io(_))
    }
}
