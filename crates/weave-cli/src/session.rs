//! Vault discovery and engine setup
//!
//! Commands work from any directory inside a vault: the root is the nearest
//! ancestor holding `.weave/config.toml`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use weave_core::config::{CONFIG_FILE, STATE_DIR};
use weave_core::{MetadataStore, SyncConfig, SyncEngine};
use weave_fs::{FsVault, NormalizedPath, Vault, VaultPath};
use weave_ledger::{Credential, CredentialProvider, DirLedger};

use crate::error::{CliError, Result};

/// Flags shared by every command that talks to a ledger.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub ledger: Option<PathBuf>,
    pub password: Option<String>,
    pub key: Option<PathBuf>,
}

/// Walk up from `start` looking for an initialized vault.
pub fn find_vault_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(STATE_DIR).join(CONFIG_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Root of the vault containing `cwd`, or a user error.
pub fn vault_root(cwd: &Path) -> Result<PathBuf> {
    find_vault_root(cwd)
        .ok_or_else(|| CliError::user("not inside a weave vault (run `weave init` first)"))
}

/// Build an engine for the vault containing `cwd`.
pub fn open_engine(cwd: &Path, args: &GlobalArgs) -> Result<SyncEngine> {
    let root_path = vault_root(cwd)?;
    let root = NormalizedPath::new(&root_path);
    let config = SyncConfig::load(&root)?;
    tracing::debug!(root = %root, vault = %config.vault_name, "opening vault");

    let ledger_dir = args
        .ledger
        .as_ref()
        .ok_or_else(|| CliError::user("no ledger configured; pass --ledger or set WEAVE_LEDGER"))?;
    let ledger = Arc::new(DirLedger::open(ledger_dir)?);

    let credentials = match &args.key {
        Some(path) => CredentialProvider::with_credential(Credential::from_key_file(path)?),
        None => CredentialProvider::new(),
    };

    let vault: Arc<dyn Vault> = Arc::new(FsVault::open(&root_path)?);
    let mut builder = SyncEngine::builder(vault, ledger)
        .config(config)
        .credentials(Arc::new(credentials))
        .store(MetadataStore::open(&root)?);
    if let Some(password) = &args.password {
        builder = builder.password(password.clone());
    }
    Ok(builder.build()?)
}

/// Parse user-supplied vault-relative paths.
pub fn parse_paths(raw: &[String]) -> Result<Vec<VaultPath>> {
    raw.iter()
        .map(|p| VaultPath::parse(p).map_err(CliError::from))
        .collect()
}
