//! Vault filesystem layer for weave-sync
//!
//! Provides vault-relative path handling, atomic I/O, content hashing and
//! format-agnostic config loading.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod path;
pub mod vault;

pub use checksum::{content_hash, content_hash_text};
pub use config::ConfigStore;
pub use error::{Error, Result};
pub use path::{NormalizedPath, VaultPath};
pub use vault::{FsVault, Vault};
