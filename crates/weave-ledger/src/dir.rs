//! Directory-backed ledger
//!
//! Each record is two files under `<root>/records/`: `<id>.bin` holds the
//! payload and `<id>.json` the header. The header is written last and acts
//! as the commit marker, so a half-written record is never visible. Existing
//! records are never overwritten.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weave_fs::{NormalizedPath, io};

use crate::client::{LedgerQuery, LedgerSubmit, Receipt, STATUS_ACCEPTED};
use crate::record::{self, RecordHeader, Tag, Tags};
use crate::{Credential, Error, Result};

const RECORDS_DIR: &str = "records";

/// Header file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HeaderFile {
    #[serde(flatten)]
    header: RecordHeader,
    /// Acceptance sequence number; breaks `received_at` ties
    seq: u64,
}

/// A ledger stored as files in a directory.
#[derive(Debug)]
pub struct DirLedger {
    root: PathBuf,
    nonce: AtomicU64,
}

impl DirLedger {
    /// Open (creating if needed) a ledger directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(RECORDS_DIR))?;
        let nonce = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        Ok(Self {
            root,
            nonce: AtomicU64::new(nonce),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn records_dir(&self) -> PathBuf {
        self.root.join(RECORDS_DIR)
    }

    fn header_path(&self, id: &str) -> PathBuf {
        self.records_dir().join(format!("{id}.json"))
    }

    fn payload_path(&self, id: &str) -> PathBuf {
        self.records_dir().join(format!("{id}.bin"))
    }

    /// Identifiers never contain path separators; reject anything that does.
    fn check_id(id: &str) -> Result<()> {
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err(Error::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn read_header(&self, id: &str) -> Result<Option<HeaderFile>> {
        match tokio::fs::read(self.header_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn all_headers(&self) -> Result<Vec<HeaderFile>> {
        let mut headers = Vec::new();
        let mut entries = tokio::fs::read_dir(self.records_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<HeaderFile>(&bytes) {
                Ok(header) => headers.push(header),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record header"),
            }
        }
        Ok(headers)
    }
}

#[async_trait]
impl LedgerQuery for DirLedger {
    async fn resolve(&self, id: &str) -> Result<Option<RecordHeader>> {
        if Self::check_id(id).is_err() {
            return Ok(None);
        }
        Ok(self.read_header(id).await?.map(|file| file.header))
    }

    async fn fetch_payload(&self, id: &str) -> Result<Vec<u8>> {
        Self::check_id(id)?;
        if self.read_header(id).await?.is_none() {
            return Err(Error::NotFound { id: id.to_string() });
        }
        Ok(tokio::fs::read(self.payload_path(id)).await?)
    }

    async fn tagged(&self, filters: &[Tag]) -> Result<Vec<RecordHeader>> {
        let mut matching: Vec<HeaderFile> = self
            .all_headers()
            .await?
            .into_iter()
            .filter(|file| file.header.tags.matches(filters))
            .collect();
        matching.sort_by_key(|file| std::cmp::Reverse((file.header.received_at, file.seq)));
        Ok(matching.into_iter().map(|file| file.header).collect())
    }
}

#[async_trait]
impl LedgerSubmit for DirLedger {
    async fn submit(&self, payload: Vec<u8>, tags: Tags, credential: &Credential) -> Result<Receipt> {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let signature = credential.sign(&record::signing_message(&payload, &tags, nonce));
        let id = record::record_id(&signature);

        if tokio::fs::try_exists(self.header_path(&id)).await? {
            return Err(Error::AlreadyExists { id });
        }

        let seq = self.all_headers().await?.len() as u64;
        let file = HeaderFile {
            header: RecordHeader {
                id: id.clone(),
                owner: credential.address().to_string(),
                tags,
                received_at: chrono::Utc::now().timestamp_millis(),
            },
            seq,
        };

        io::write_atomic(&NormalizedPath::new(self.payload_path(&id)), &payload)?;
        io::write_atomic(
            &NormalizedPath::new(self.header_path(&id)),
            &serde_json::to_vec_pretty(&file)?,
        )?;
        tracing::debug!(id = %id, bytes = payload.len(), "record appended");

        Ok(Receipt {
            id,
            status: STATUS_ACCEPTED,
        })
    }
}
