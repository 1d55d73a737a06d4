//! History and show command implementations

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde_json::json;
use weave_core::Plaintext;
use weave_fs::{NormalizedPath, VaultPath, io};

use crate::error::{CliError, Result};
use crate::session::{GlobalArgs, open_engine};

/// Run the history command
pub async fn run_history(
    cwd: &Path,
    args: &GlobalArgs,
    path: &str,
    depth: u32,
    json: bool,
) -> Result<()> {
    let path = VaultPath::parse(path)?;
    let engine = open_engine(cwd, args)?;
    engine.refresh_remote().await?;
    let entries = engine.history(&path, depth).await?;

    if json {
        let versions: Vec<_> = entries
            .iter()
            .map(|e| {
                json!({
                    "id": e.id,
                    "version": e.tags.version_number,
                    "timestamp": e.tags.timestamp,
                    "content_hash": e.tags.content_hash,
                    "previous": e.tags.previous_version_id,
                    "encrypted": e.tags.encrypted,
                })
            })
            .collect();
        let output = json!({ "path": path, "versions": versions });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{} has no exported versions", path.to_string().cyan());
        return Ok(());
    }

    println!("{} {}", "History of".bold(), path.to_string().cyan());
    println!();
    for entry in &entries {
        let hash = entry
            .tags
            .content_hash
            .strip_prefix("sha256:")
            .unwrap_or(&entry.tags.content_hash);
        println!(
            "  {:>4}  {}  {}  {}",
            format!("v{}", entry.tags.version_number).bold(),
            format_timestamp(entry.tags.timestamp),
            &hash[..hash.len().min(12)],
            entry.id.dimmed()
        );
    }
    Ok(())
}

/// Run the show command
pub async fn run_show(
    cwd: &Path,
    args: &GlobalArgs,
    path: &str,
    back: u32,
    output: Option<&Path>,
) -> Result<()> {
    let path = VaultPath::parse(path)?;
    let engine = open_engine(cwd, args)?;
    engine.refresh_remote().await?;

    let content = engine
        .previous_version_plaintext(&path, back)
        .await?
        .ok_or_else(|| CliError::user(format!("{path} has no version {back} back")))?;

    match output {
        Some(target) => {
            io::write_atomic(&NormalizedPath::new(target), content.as_bytes())?;
            eprintln!("{} Wrote {}", "OK".green().bold(), target.display());
        }
        None => match content {
            Plaintext::Text(text) => print!("{text}"),
            Plaintext::Binary(bytes) => std::io::stdout().write_all(&bytes)?,
        },
    }
    Ok(())
}

fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}
