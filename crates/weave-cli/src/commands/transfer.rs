//! Export and import command implementations
//!
//! Both print one line per file and fail with the aggregate batch error when
//! any file failed, after the whole batch has run.

use std::path::Path;

use colored::Colorize;
use serde_json::json;
use weave_core::{FileOutcome, SyncReport};

use crate::error::Result;
use crate::session::{GlobalArgs, open_engine, parse_paths};

/// Run the export command
pub async fn run_export(cwd: &Path, args: &GlobalArgs, paths: &[String], json: bool) -> Result<()> {
    let engine = open_engine(cwd, args)?;
    if !json {
        println!("{} Exporting to the ledger...", "=>".blue().bold());
    }

    let report = if paths.is_empty() {
        engine.export_all().await?
    } else {
        let paths = parse_paths(paths)?;
        engine.refresh_remote().await?;
        engine.export_paths(&paths).await?
    };

    finish(report, json)
}

/// Run the import command
pub async fn run_import(cwd: &Path, args: &GlobalArgs, paths: &[String], json: bool) -> Result<()> {
    let engine = open_engine(cwd, args)?;
    if !json {
        println!("{} Importing from the ledger...", "=>".blue().bold());
    }

    let report = if paths.is_empty() {
        engine.import_all().await?
    } else {
        let paths = parse_paths(paths)?;
        engine.refresh_remote().await?;
        engine.import_paths(&paths).await
    };

    finish(report, json)
}

fn finish(report: SyncReport, json: bool) -> Result<()> {
    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    report.into_result()?;
    Ok(())
}

fn print_report(report: &SyncReport) {
    for file in &report.files {
        let marker = match &file.outcome {
            FileOutcome::Exported { .. } | FileOutcome::Imported { .. } => "+".green(),
            FileOutcome::Skipped { .. } => "=".dimmed(),
            FileOutcome::Failed(_) => "x".red(),
        };
        println!("  {} {} {}", marker, file.path, file.outcome.to_string().dimmed());
    }
    if let Some(id) = &report.published {
        println!("  {} vault map {}", "+".green(), id.dimmed());
    }
    if let Some(e) = &report.publish_error {
        println!("  {} vault map: {}", "x".red(), e);
    }

    println!();
    let summary = report.summary();
    if report.is_success() {
        println!("{} {} ({} changed)", "OK".green().bold(), summary, report.changed());
    } else {
        println!("{} {}", "FAILED".red().bold(), summary);
    }
}

fn print_json(report: &SyncReport) -> Result<()> {
    let files: Vec<_> = report
        .files
        .iter()
        .map(|f| {
            let (action, detail) = match &f.outcome {
                FileOutcome::Exported { id, version_number } => {
                    ("exported", json!({ "id": id, "version": version_number }))
                }
                FileOutcome::Imported { id, version_number } => {
                    ("imported", json!({ "id": id, "version": version_number }))
                }
                FileOutcome::Skipped { reason } => ("skipped", json!({ "reason": reason })),
                FileOutcome::Failed(e) => ("failed", json!({ "error": e.to_string() })),
            };
            json!({ "path": f.path, "action": action, "detail": detail })
        })
        .collect();

    let output = json!({
        "success": report.is_success(),
        "summary": report.summary(),
        "changed": report.changed(),
        "published": report.published,
        "publish_error": report.publish_error.as_ref().map(|e| e.to_string()),
        "files": files,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
