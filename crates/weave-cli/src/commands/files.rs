//! Move and remove command implementations
//!
//! The file is changed on disk first, then the engine's metadata follows and
//! the remote map is republished when a key is available.

use std::path::Path;

use colored::Colorize;
use weave_fs::{FsVault, Vault, VaultPath};

use crate::error::{CliError, Result};
use crate::session::{GlobalArgs, open_engine, vault_root};

/// Run the mv command
pub async fn run_move(cwd: &Path, args: &GlobalArgs, from: &str, to: &str) -> Result<()> {
    let from = VaultPath::parse(from)?;
    let to = VaultPath::parse(to)?;
    let vault = FsVault::open(vault_root(cwd)?)?;
    if !vault.exists(&from) {
        return Err(CliError::user(format!("{from} does not exist")));
    }
    if vault.exists(&to) {
        return Err(CliError::user(format!("{to} already exists")));
    }

    let engine = open_engine(cwd, args)?;
    engine.refresh_remote().await?;
    vault.rename(&from, &to)?;
    engine.rename(&from, &to).await?;

    println!("{} {} -> {}", "moved".green(), from, to.to_string().cyan());
    Ok(())
}

/// Run the rm command
pub async fn run_remove(cwd: &Path, args: &GlobalArgs, path: &str) -> Result<()> {
    let path = VaultPath::parse(path)?;
    let vault = FsVault::open(vault_root(cwd)?)?;

    let engine = open_engine(cwd, args)?;
    engine.refresh_remote().await?;
    if vault.exists(&path) {
        vault.remove(&path)?;
    }
    engine.delete(&path).await?;

    println!("{} {}", "removed".red(), path);
    Ok(())
}
