//! Version chain traversal
//!
//! Each file version links to its predecessor through the `Previous-Version`
//! tag, forming a singly linked list that can only be walked backward from
//! the identifier held in the metadata map. Links are followed by resolving
//! headers; payloads are downloaded only for the version asked for.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use weave_fs::VaultPath;
use weave_ledger::{LedgerQuery, RecordHeader, RetryPolicy, Tag, VersionTags};

use crate::metadata::MetadataMap;
use crate::{Error, Result};

/// A historical version as fetched from the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousVersion {
    pub id: String,
    pub timestamp: i64,
    pub version_number: u32,
    pub content_hash: String,
    pub encrypted: bool,
    /// Payload as stored; still encrypted when `encrypted` is set
    pub payload: Vec<u8>,
}

/// One link of a chain, without its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub id: String,
    pub tags: VersionTags,
}

/// Walks version chains and fetches payloads with bounded retry.
#[derive(Clone)]
pub struct VersionChainClient {
    ledger: Arc<dyn LedgerQuery>,
    fetch_retry: RetryPolicy,
    link_retry: RetryPolicy,
    cancel: CancellationToken,
}

impl VersionChainClient {
    pub fn new(ledger: Arc<dyn LedgerQuery>) -> Self {
        Self {
            ledger,
            fetch_retry: RetryPolicy::default(),
            link_retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, fetch: RetryPolicy, link: RetryPolicy) -> Self {
        self.fetch_retry = fetch;
        self.link_retry = link;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetch the version `n` links behind the current one (`n = 0` is the
    /// current version).
    ///
    /// Returns `Ok(None)` when the path has no current identifier, the chain
    /// ends before depth `n`, or a link cannot be resolved.
    pub async fn fetch_previous_version(
        &self,
        path: &VaultPath,
        n: u32,
        snapshot: &MetadataMap,
    ) -> Result<Option<PreviousVersion>> {
        let Some(current) = snapshot.get(path).and_then(|meta| meta.identifier.clone()) else {
            tracing::debug!(path = %path, "no current version to walk from");
            return Ok(None);
        };

        let Some(target) = self.walk(path, &current, n).await? else {
            return Ok(None);
        };

        let payload = match self.fetch_payload(&target.id).await {
            Ok(payload) => payload,
            Err(Error::Ledger(weave_ledger::Error::NotFound { id })) => {
                let broken = Error::ChainIntegrity {
                    path: path.to_string(),
                    id,
                };
                tracing::warn!(error = %broken, "payload missing for resolved record");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(Some(PreviousVersion {
            id: target.id,
            timestamp: target.tags.timestamp,
            version_number: target.tags.version_number,
            content_hash: target.tags.content_hash,
            encrypted: target.tags.encrypted,
            payload,
        }))
    }

    /// Download a record payload, retrying transient failures.
    pub async fn fetch_payload(&self, id: &str) -> Result<Vec<u8>> {
        let label = format!("fetch payload {id}");
        self.fetch_retry
            .run(&label, &self.cancel, || self.ledger.fetch_payload(id))
            .await
            .map_err(|e| Error::from_fetch(id, e))
    }

    /// Headers of every record carrying all `filters`, newest first,
    /// retrying transient failures.
    pub async fn tagged(&self, filters: &[Tag]) -> Result<Vec<RecordHeader>> {
        self.link_retry
            .run("query tagged records", &self.cancel, || self.ledger.tagged(filters))
            .await
            .map_err(|e| Error::from_fetch("tagged records", e))
    }

    /// Headers of the current version and up to `depth` predecessors, newest
    /// first. Stops quietly where the chain ends or breaks.
    pub async fn history(
        &self,
        path: &VaultPath,
        depth: u32,
        snapshot: &MetadataMap,
    ) -> Result<Vec<ChainEntry>> {
        let mut entries = Vec::new();
        let mut next = snapshot.get(path).and_then(|meta| meta.identifier.clone());

        while let Some(id) = next.take() {
            let Some(entry) = self.resolve_entry(path, &id).await? else {
                break;
            };
            next = entry.tags.previous_version_id.clone();
            entries.push(entry);
            if entries.len() > depth as usize {
                break;
            }
        }
        Ok(entries)
    }

    /// Follow `n` links back from `start`.
    async fn walk(&self, path: &VaultPath, start: &str, n: u32) -> Result<Option<ChainEntry>> {
        let Some(mut entry) = self.resolve_entry(path, start).await? else {
            return Ok(None);
        };

        for step in 0..n {
            let Some(previous) = entry.tags.previous_version_id.clone() else {
                tracing::debug!(
                    path = %path,
                    requested = n,
                    available = step,
                    "chain shorter than requested depth"
                );
                return Ok(None);
            };
            let Some(next) = self.resolve_entry(path, &previous).await? else {
                return Ok(None);
            };
            entry = next;
        }
        Ok(Some(entry))
    }

    /// Resolve one link. Missing or unreadable records end the walk.
    async fn resolve_entry(&self, path: &VaultPath, id: &str) -> Result<Option<ChainEntry>> {
        let label = format!("resolve link {id}");
        let header: Option<RecordHeader> = self
            .link_retry
            .run(&label, &self.cancel, || self.ledger.resolve(id))
            .await
            .map_err(|e| Error::from_fetch(id, e))?;

        let broken = || Error::ChainIntegrity {
            path: path.to_string(),
            id: id.to_string(),
        };

        let Some(header) = header else {
            tracing::warn!(error = %broken(), "link does not resolve");
            return Ok(None);
        };

        match VersionTags::from_header(&header) {
            Ok(tags) => Ok(Some(ChainEntry {
                id: header.id,
                tags,
            })),
            Err(e) => {
                tracing::warn!(error = %broken(), reason = %e, "link is not a file version");
                Ok(None)
            }
        }
    }
}
