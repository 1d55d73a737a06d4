//! weave-sync CLI
//!
//! The command-line interface for syncing a vault with a shared ledger.

mod cli;
mod commands;
mod error;
mod session;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use error::Result;
use session::GlobalArgs;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let args = GlobalArgs {
        ledger: cli.ledger,
        password: cli.password,
        key: cli.key,
    };

    match cli.command {
        Some(cmd) => execute_command(cmd, &args).await,
        None => {
            println!("{} vault sync", "weave".green().bold());
            println!();
            println!("Run {} for available commands.", "weave --help".cyan());
            Ok(())
        }
    }
}

/// Debug logs on `--verbose`, otherwise warnings unless `WEAVE_LOG` says
/// otherwise. Logs go to stderr so `--json` output stays clean.
fn init_tracing(verbose: bool) {
    let result = if verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let filter =
            EnvFilter::try_from_env("WEAVE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    if let Err(e) = result {
        eprintln!("{}: {}", "warning".yellow().bold(), e);
    }
    tracing::debug!("Verbose mode enabled");
}

async fn execute_command(cmd: Commands, args: &GlobalArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    match cmd {
        Commands::Init { name, no_encrypt } => commands::run_init(&cwd, name.as_deref(), no_encrypt),
        Commands::Keygen { output, force } => commands::run_keygen(&output, force),
        Commands::Status { json } => commands::run_status(&cwd, args, json).await,
        Commands::Export { paths, json } => commands::run_export(&cwd, args, &paths, json).await,
        Commands::Import { paths, json } => commands::run_import(&cwd, args, &paths, json).await,
        Commands::History { path, depth, json } => {
            commands::run_history(&cwd, args, &path, depth, json).await
        }
        Commands::Show { path, back, output } => {
            commands::run_show(&cwd, args, &path, back, output.as_deref()).await
        }
        Commands::Mv { from, to } => commands::run_move(&cwd, args, &from, &to).await,
        Commands::Rm { path } => commands::run_remove(&cwd, args, &path).await,
    }
}
