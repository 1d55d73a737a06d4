//! Sync engine for weave-sync
//!
//! Keeps a vault of files in step with an append-only ledger. Every export
//! appends an immutable, encrypted version that links back to its
//! predecessor; the metadata maps record which version each path is at
//! locally and remotely, and the evaluator compares the two.
//!
//! The main entry point is [`SyncEngine`], built from a [`weave_fs::Vault`]
//! and a [`weave_ledger::Ledger`].

pub mod chain;
pub mod cipher;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod locks;
pub mod metadata;
pub mod remote;
pub mod report;
pub mod upload;

pub use chain::{ChainEntry, PreviousVersion, VersionChainClient};
pub use cipher::{Cipher, CipherError, CipherParams, Plaintext};
pub use config::{RetryConfig, SyncConfig};
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use error::{Error, Result};
pub use evaluate::{SyncStatus, SyncVerdict, evaluate};
pub use locks::PathLocks;
pub use metadata::{FileSyncMetadata, MetadataMap, MetadataStore, SyncState};
pub use remote::RemoteMetadataStore;
pub use report::{FileOutcome, FileReport, StatusReport, SyncReport};
pub use upload::UploadClient;
