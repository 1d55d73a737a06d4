//! SHA-256 content hashing
//!
//! Provides a single canonical digest format (`sha256:<hex>`) used to detect
//! local modification and to tag uploaded version records. Text is hashed as
//! its UTF-8 bytes, so the same plaintext produces the same digest whether a
//! call site holds it as `&str` or `&[u8]`.

use sha2::{Digest, Sha256};

/// Prefix for all digests produced by this module
const PREFIX: &str = "sha256:";

/// Compute the digest of raw bytes.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the digest of text content.
pub fn content_hash_text(content: &str) -> String {
    content_hash(content.as_bytes())
}
