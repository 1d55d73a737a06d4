//! Sync configuration
//!
//! Stored at `.weave/config.toml` inside the vault.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use weave_fs::{ConfigStore, NormalizedPath};
use weave_ledger::RetryPolicy;

use crate::Result;
use crate::cipher::CipherParams;

/// Directory inside the vault holding sync state
pub const STATE_DIR: &str = ".weave";
/// Config file name inside [`STATE_DIR`]
pub const CONFIG_FILE: &str = "config.toml";
/// Metadata file name inside [`STATE_DIR`]
pub const STATE_FILE: &str = "state.json";

/// Retry settings for ledger fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_delay_ms: u64,
    /// Also retry header resolves while walking a version chain
    pub retry_link_walk: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 500,
            retry_link_walk: true,
        }
    }
}

impl RetryConfig {
    pub fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.base_delay_ms))
    }

    pub fn link_policy(&self) -> RetryPolicy {
        if self.retry_link_walk {
            self.fetch_policy()
        } else {
            RetryPolicy::none()
        }
    }
}

/// Per-vault sync settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Name tagged on every record; separates vaults sharing a ledger
    pub vault_name: String,
    /// Encrypt payloads before upload
    pub encrypt: bool,
    pub retry: RetryConfig,
    pub cipher: CipherParams,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            vault_name: "vault".to_string(),
            encrypt: true,
            retry: RetryConfig::default(),
            cipher: CipherParams::default(),
        }
    }
}

impl SyncConfig {
    pub fn new(vault_name: impl Into<String>) -> Self {
        Self {
            vault_name: vault_name.into(),
            ..Self::default()
        }
    }

    /// Location of the config file for a vault rooted at `root`.
    pub fn path_in(root: &NormalizedPath) -> NormalizedPath {
        root.join(STATE_DIR).join(CONFIG_FILE)
    }

    /// Load the vault's config, using defaults when none has been written.
    pub fn load(root: &NormalizedPath) -> Result<Self> {
        Ok(ConfigStore::new().load_or_default(&Self::path_in(root))?)
    }

    pub fn save(&self, root: &NormalizedPath) -> Result<()> {
        ConfigStore::new().save(&Self::path_in(root), self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_config_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = SyncConfig::load(&NormalizedPath::new(temp.path())).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert!(config.encrypt);
        assert_eq!(config.retry.attempts, 3);
    }

    #[test]
    fn save_and_reload() {
        let temp = TempDir::new().unwrap();
        let root = NormalizedPath::new(temp.path());
        let mut config = SyncConfig::new("work");
        config.encrypt = false;
        config.retry.retry_link_walk = false;

        config.save(&root).unwrap();

        assert!(temp.path().join(".weave/config.toml").exists());
        assert_eq!(SyncConfig::load(&root).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".weave")).unwrap();
        std::fs::write(
            temp.path().join(".weave/config.toml"),
            "vault_name = \"notes\"\n[retry]\nattempts = 5\n",
        )
        .unwrap();

        let config = SyncConfig::load(&NormalizedPath::new(temp.path())).unwrap();
        assert_eq!(config.vault_name, "notes");
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert!(config.encrypt);
    }

    #[test]
    fn link_walk_retry_can_be_disabled() {
        let retry = RetryConfig {
            retry_link_walk: false,
            ..RetryConfig::default()
        };
        assert_eq!(retry.link_policy(), RetryPolicy::none());
        assert_eq!(retry.fetch_policy().attempts, 3);
    }
}
