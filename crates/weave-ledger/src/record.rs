//! Ledger records and their tag sets
//!
//! A record on the ledger is an opaque payload plus an ordered list of
//! name/value tags. File versions carry their lineage in tags, so a version
//! chain can be walked by resolving headers without downloading payloads.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Value of the `App-Name` tag on every record this crate writes.
pub const APP_NAME: &str = "weave-sync";

/// Tag names
pub mod tag {
    pub const APP_NAME: &str = "App-Name";
    pub const RECORD_TYPE: &str = "Record-Type";
    pub const VAULT_NAME: &str = "Vault-Name";
    pub const FILE_PATH: &str = "File-Path";
    pub const CONTENT_HASH: &str = "Content-Hash";
    pub const PREVIOUS_VERSION: &str = "Previous-Version";
    pub const VERSION_NUMBER: &str = "Version-Number";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const ENCRYPTED: &str = "Encrypted";
}

/// A single name/value tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered tag set attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(Tag::new(name, value));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }

    /// True if every filter tag is present with an equal value.
    pub fn matches(&self, filters: &[Tag]) -> bool {
        filters
            .iter()
            .all(|f| self.0.iter().any(|t| t.name == f.name && t.value == f.value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Kinds of records written by weave-sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// One immutable version of one vault file
    FileVersion,
    /// A snapshot of the vault's remote metadata map
    VaultConfig,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileVersion => "file-version",
            Self::VaultConfig => "vault-config",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about a record without downloading its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub id: String,
    /// Address of the credential that signed the record
    pub owner: String,
    pub tags: Tags,
    /// Time the ledger accepted the record, ms since epoch
    pub received_at: i64,
}

/// Lineage and integrity tags of a file version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTags {
    pub path: String,
    /// Digest of the plaintext content
    pub content_hash: String,
    /// `None` for the first version of a file
    pub previous_version_id: Option<String>,
    /// Starts at 1
    pub version_number: u32,
    /// Creation time, ms since epoch
    pub timestamp: i64,
    pub encrypted: bool,
}

impl VersionTags {
    /// Render as a ledger tag set.
    pub fn to_tags(&self, vault_name: &str) -> Tags {
        let mut tags = Tags::new()
            .with(tag::APP_NAME, APP_NAME)
            .with(tag::RECORD_TYPE, RecordType::FileVersion.as_str())
            .with(tag::VAULT_NAME, vault_name)
            .with(tag::FILE_PATH, &self.path)
            .with(tag::CONTENT_HASH, &self.content_hash);
        if let Some(previous) = &self.previous_version_id {
            tags.push(tag::PREVIOUS_VERSION, previous);
        }
        tags.with(tag::VERSION_NUMBER, self.version_number.to_string())
            .with(tag::TIMESTAMP, self.timestamp.to_string())
            .with(tag::ENCRYPTED, self.encrypted.to_string())
    }

    /// Parse the lineage tags of a file-version record.
    pub fn from_header(header: &RecordHeader) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedRecord {
            id: header.id.clone(),
            reason,
        };
        let required = |name: &str| {
            header
                .tags
                .get(name)
                .ok_or_else(|| malformed(format!("missing {name} tag")))
        };

        let record_type = required(tag::RECORD_TYPE)?;
        if record_type != RecordType::FileVersion.as_str() {
            return Err(malformed(format!("expected file-version, found {record_type}")));
        }

        let version_number = required(tag::VERSION_NUMBER)?
            .parse::<u32>()
            .map_err(|e| malformed(format!("bad {}: {e}", tag::VERSION_NUMBER)))?;
        let timestamp = required(tag::TIMESTAMP)?
            .parse::<i64>()
            .map_err(|e| malformed(format!("bad {}: {e}", tag::TIMESTAMP)))?;

        Ok(Self {
            path: required(tag::FILE_PATH)?.to_string(),
            content_hash: required(tag::CONTENT_HASH)?.to_string(),
            previous_version_id: header
                .tags
                .get(tag::PREVIOUS_VERSION)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            version_number,
            timestamp,
            encrypted: header.tags.get(tag::ENCRYPTED) != Some("false"),
        })
    }
}

/// Message a credential signs when submitting a record.
pub fn signing_message(payload: &[u8], tags: &Tags, nonce: u64) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    let payload_digest = hasher.finalize();

    let mut message = Vec::with_capacity(64 + tags.len() * 32);
    message.extend_from_slice(&payload_digest);
    for tag in tags.iter() {
        message.extend_from_slice(tag.name.as_bytes());
        message.push(0);
        message.extend_from_slice(tag.value.as_bytes());
        message.push(0);
    }
    message.extend_from_slice(&nonce.to_be_bytes());
    message
}

/// Content-address a record from its signature: base64url(SHA-256(signature)).
pub fn record_id(signature: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(signature))
}
