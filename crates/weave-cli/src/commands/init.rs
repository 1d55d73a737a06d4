//! Init command implementation

use std::path::Path;

use colored::Colorize;
use weave_core::SyncConfig;
use weave_fs::NormalizedPath;

use crate::error::{CliError, Result};

/// Run the init command
///
/// Writes `.weave/config.toml` in `path`. The vault name defaults to the
/// directory name.
pub fn run_init(path: &Path, name: Option<&str>, no_encrypt: bool) -> Result<()> {
    let root = NormalizedPath::new(path);
    let config_path = SyncConfig::path_in(&root);
    if config_path.exists() {
        return Err(CliError::user(format!(
            "vault already initialized at {}",
            path.display()
        )));
    }

    let name = match name {
        Some(name) => name.to_string(),
        None => dir_name(path).unwrap_or_else(|| "vault".to_string()),
    };
    let mut config = SyncConfig::new(name);
    config.encrypt = !no_encrypt;
    config.save(&root)?;

    println!(
        "{} Initialized vault {}",
        "OK".green().bold(),
        config.vault_name.cyan()
    );
    println!("{}:     {}", "Config".dimmed(), config_path);
    let mode = if config.encrypt {
        "encrypted".green()
    } else {
        "plaintext".yellow()
    };
    println!("{}:    {}", "Payload".dimmed(), mode);
    Ok(())
}

fn dir_name(path: &Path) -> Option<String> {
    let canonical = path.canonicalize().ok()?;
    canonical.file_name().map(|n| n.to_string_lossy().into_owned())
}
