//! Ledger plumbing for weave-sync
//!
//! The ledger is an append-only, content-addressed store: every write returns
//! an immutable record identifier and nothing is ever updated in place. This
//! crate defines the seams the sync engine consumes:
//!
//! - [`LedgerQuery`] / [`LedgerSubmit`]: resolve records, fetch payloads, append
//! - [`CredentialProvider`]: the injected signing credential and its
//!   connect/disconnect state
//! - [`RetryPolicy`]: bounded, cancellable retry for network round trips
//!
//! Two reference implementations are provided: [`MemoryLedger`] (in-process,
//! with failure injection) and [`DirLedger`] (a directory of record files).

pub mod client;
pub mod credential;
pub mod dir;
pub mod error;
pub mod memory;
pub mod record;
pub mod retry;

pub use client::{Ledger, LedgerQuery, LedgerSubmit, Receipt};
pub use credential::{ConnectionState, Credential, CredentialProvider};
pub use dir::DirLedger;
pub use error::{Error, Result};
pub use memory::MemoryLedger;
pub use record::{RecordHeader, RecordType, Tag, Tags, VersionTags};
pub use retry::RetryPolicy;
