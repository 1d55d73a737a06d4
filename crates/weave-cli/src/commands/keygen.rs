//! Keygen command implementation

use std::path::Path;

use colored::Colorize;
use weave_fs::{NormalizedPath, io};
use weave_ledger::Credential;

use crate::error::{CliError, Result};

/// Generate a signing credential and write it to `output`.
pub fn run_keygen(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(CliError::user(format!(
            "{} already exists (use --force to overwrite)",
            output.display()
        )));
    }

    let credential = Credential::generate();
    io::write_text(&NormalizedPath::new(output), &credential.export_key())?;

    println!("{} Wrote key to {}", "OK".green().bold(), output.display());
    println!("{}:    {}", "Address".dimmed(), credential.address().cyan());
    Ok(())
}
