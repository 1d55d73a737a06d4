//! In-process ledger
//!
//! Keeps records in memory and lets tests inject transport failures into
//! payload fetches, header resolves, tag queries and submissions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::client::{LedgerQuery, LedgerSubmit, Receipt, STATUS_ACCEPTED};
use crate::record::{self, RecordHeader, Tag, Tags};
use crate::{Credential, Error, Result};

#[derive(Debug, Clone)]
struct StoredRecord {
    header: RecordHeader,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<String, StoredRecord>,
    /// Acceptance order, oldest first
    order: Vec<String>,
}

/// A ledger held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<Records>,
    nonce: AtomicU64,
    failing_fetches: AtomicU32,
    failing_resolves: AtomicU32,
    failing_queries: AtomicU32,
    rejected_submits: AtomicU32,
    /// Submissions carrying this tag are rejected until cleared
    rejected_tag: Mutex<Option<(Tag, u16)>>,
    reject_status: AtomicU32,
    fetch_calls: AtomicU32,
    submit_calls: AtomicU32,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` payload fetches fail with a network error.
    pub fn fail_next_fetches(&self, count: u32) {
        self.failing_fetches.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` header resolves fail with a network error.
    pub fn fail_next_resolves(&self, count: u32) {
        self.failing_resolves.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` tag queries fail with a network error.
    pub fn fail_next_queries(&self, count: u32) {
        self.failing_queries.store(count, Ordering::SeqCst);
    }

    /// Reject every submission carrying `tag` with `status` until
    /// [`accept_all_submits`](Self::accept_all_submits) is called.
    pub fn reject_submits_tagged(&self, tag: Tag, status: u16) {
        *self.rejected_tag.lock().unwrap_or_else(PoisonError::into_inner) = Some((tag, status));
    }

    pub fn accept_all_submits(&self) {
        self.rejected_submits.store(0, Ordering::SeqCst);
        *self.rejected_tag.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Make the next `count` submissions come back with `status`.
    pub fn reject_next_submits(&self, count: u32, status: u16) {
        self.reject_status.store(u32::from(status), Ordering::SeqCst);
        self.rejected_submits.store(count, Ordering::SeqCst);
    }

    /// Number of payload fetch attempts observed, failed ones included.
    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of submission attempts observed, rejected ones included.
    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of accepted records.
    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Headers of every accepted record carrying all `filters`, oldest first.
    pub fn headers(&self, filters: &[Tag]) -> Vec<RecordHeader> {
        let records = self.lock();
        records
            .order
            .iter()
            .filter_map(|id| records.by_id.get(id))
            .filter(|r| r.header.tags.matches(filters))
            .map(|r| r.header.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decrement `counter` if positive; true means "fail this call".
    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LedgerQuery for MemoryLedger {
    async fn resolve(&self, id: &str) -> Result<Option<RecordHeader>> {
        if Self::take_failure(&self.failing_resolves) {
            return Err(Error::network(format!("injected resolve failure for {id}")));
        }
        Ok(self.lock().by_id.get(id).map(|r| r.header.clone()))
    }

    async fn fetch_payload(&self, id: &str) -> Result<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_fetches) {
            return Err(Error::network(format!("injected fetch failure for {id}")));
        }
        self.lock()
            .by_id
            .get(id)
            .map(|r| r.payload.clone())
            .ok_or_else(|| Error::NotFound { id: id.to_string() })
    }

    async fn tagged(&self, filters: &[Tag]) -> Result<Vec<RecordHeader>> {
        if Self::take_failure(&self.failing_queries) {
            return Err(Error::network("injected query failure"));
        }
        let mut headers = self.headers(filters);
        headers.reverse();
        Ok(headers)
    }
}

#[async_trait]
impl LedgerSubmit for MemoryLedger {
    async fn submit(&self, payload: Vec<u8>, tags: Tags, credential: &Credential) -> Result<Receipt> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let signature = credential.sign(&record::signing_message(&payload, &tags, nonce));
        let id = record::record_id(&signature);

        if Self::take_failure(&self.rejected_submits) {
            let status = u16::try_from(self.reject_status.load(Ordering::SeqCst)).unwrap_or(500);
            return Ok(Receipt { id, status });
        }
        let tag_rejection = self
            .rejected_tag
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|(tag, _)| tags.matches(std::slice::from_ref(tag)))
            .map(|(_, status)| *status);
        if let Some(status) = tag_rejection {
            return Ok(Receipt { id, status });
        }

        let header = RecordHeader {
            id: id.clone(),
            owner: credential.address().to_string(),
            tags,
            received_at: chrono::Utc::now().timestamp_millis(),
        };

        let mut records = self.lock();
        if records.by_id.contains_key(&id) {
            return Err(Error::AlreadyExists { id });
        }
        records.order.push(id.clone());
        records.by_id.insert(id.clone(), StoredRecord { header, payload });

        Ok(Receipt {
            id,
            status: STATUS_ACCEPTED,
        })
    }
}
