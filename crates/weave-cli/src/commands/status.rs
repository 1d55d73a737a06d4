//! Status command implementation

use std::path::Path;

use colored::{ColoredString, Colorize};
use serde_json::json;
use weave_core::{StatusReport, SyncStatus};

use crate::error::Result;
use crate::session::{GlobalArgs, open_engine};

/// Run the status command
pub async fn run_status(cwd: &Path, args: &GlobalArgs, json: bool) -> Result<()> {
    let engine = open_engine(cwd, args)?;
    let published = engine.refresh_remote().await?;
    let report = engine.status().await?;

    if json {
        let output = json!({
            "synced": report.is_synced(),
            "remote_published": published,
            "files": report.files,
            "remote_only": report.remote_only,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_report(&report, published);
    Ok(())
}

fn print_report(report: &StatusReport, published: bool) {
    println!("{}", "Vault Status".bold());
    println!();

    if !published {
        println!("  {}", "Nothing published to the ledger yet".dimmed());
        println!();
    }

    if report.files.is_empty() && report.remote_only.is_empty() {
        println!("  {}", "No files".dimmed());
        return;
    }

    for verdict in &report.files {
        let version = match (verdict.local_version, verdict.remote_version) {
            (_, Some(remote)) => format!("v{remote}"),
            (Some(local), None) => format!("v{local}"),
            (None, None) => String::new(),
        };
        println!(
            "  {:<14} {} {}",
            colored_status(verdict.status),
            verdict.path,
            version.dimmed()
        );
    }
    for path in &report.remote_only {
        println!("  {:<14} {}", "remote-only".blue(), path);
    }

    println!();
    if report.is_synced() {
        println!("{}", "Everything is in sync".green());
    } else {
        let pending = report.count(SyncStatus::NewFile) + report.count(SyncStatus::UpdatedFile);
        let incoming = report.count(SyncStatus::RemoteNewer) + report.remote_only.len();
        println!(
            "{} to export, {} to import",
            pending.to_string().yellow(),
            incoming.to_string().blue()
        );
    }
}

fn colored_status(status: SyncStatus) -> ColoredString {
    match status {
        SyncStatus::Synced => status.as_str().green(),
        SyncStatus::NewFile => status.as_str().yellow(),
        SyncStatus::UpdatedFile => status.as_str().yellow().bold(),
        SyncStatus::RemoteNewer => status.as_str().blue(),
    }
}
