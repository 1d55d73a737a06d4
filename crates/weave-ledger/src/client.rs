//! Ledger client traits
//!
//! The sync engine never talks to a concrete network. It consumes these two
//! traits, split the same way the real service splits its read gateway from
//! its transaction submission endpoint.

use async_trait::async_trait;

use crate::record::{RecordHeader, Tag, Tags};
use crate::{Credential, Result};

/// HTTP-style status a ledger reports for an accepted submission.
pub const STATUS_ACCEPTED: u16 = 200;

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Identifier assigned to the new record
    pub id: String,
    /// Status reported by the ledger; only 200 means the record is durable
    pub status: u16,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_ACCEPTED
    }
}

/// Read side of the ledger.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Resolve a record's header by identifier. `Ok(None)` if it does not exist.
    async fn resolve(&self, id: &str) -> Result<Option<RecordHeader>>;

    /// Download a record's raw payload bytes.
    async fn fetch_payload(&self, id: &str) -> Result<Vec<u8>>;

    /// Headers of every accepted record carrying all filter tags, newest first.
    async fn tagged(&self, filters: &[Tag]) -> Result<Vec<RecordHeader>>;
}

/// Write side of the ledger.
#[async_trait]
pub trait LedgerSubmit: Send + Sync {
    /// Sign and durably append a record.
    async fn submit(&self, payload: Vec<u8>, tags: Tags, credential: &Credential) -> Result<Receipt>;
}

/// A ledger that supports both reads and writes.
pub trait Ledger: LedgerQuery + LedgerSubmit {}

impl<T: LedgerQuery + LedgerSubmit> Ledger for T {}
