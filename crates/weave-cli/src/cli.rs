//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// weave - keep a folder of notes in sync with an append-only ledger
#[derive(Parser, Debug)]
#[command(name = "weave")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Ledger directory shared between devices
    #[arg(long, global = true, env = "WEAVE_LEDGER")]
    pub ledger: Option<PathBuf>,

    /// Password used to encrypt and decrypt file contents
    #[arg(long, global = true, env = "WEAVE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Key file holding the signing credential
    #[arg(long, global = true, env = "WEAVE_KEY")]
    pub key: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Initialize a vault in the current directory
    ///
    /// Creates a .weave/ directory with config.toml.
    ///
    /// Examples:
    ///   weave init                  # Vault named after the directory
    ///   weave init --name notes     # Explicit vault name
    ///   weave init --no-encrypt     # Upload plaintext
    Init {
        /// Vault name tagged on every record
        #[arg(short, long)]
        name: Option<String>,

        /// Store payloads unencrypted
        #[arg(long)]
        no_encrypt: bool,
    },

    /// Generate a new signing key file
    Keygen {
        /// Where to write the key
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the sync state of every file
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Upload new and modified files
    ///
    /// Without paths, every file in the vault is considered.
    Export {
        /// Vault-relative paths to export
        paths: Vec<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Download remote versions into the vault
    ///
    /// Without paths, every path in the remote map is considered.
    Import {
        /// Vault-relative paths to import
        paths: Vec<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List the version chain of a file, newest first
    History {
        /// Vault-relative path
        path: String,

        /// How many predecessors to walk
        #[arg(short, long, default_value_t = 10)]
        depth: u32,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Print the content of an earlier version
    Show {
        /// Vault-relative path
        path: String,

        /// Versions to step back; 0 is the current one
        #[arg(short, long, default_value_t = 1)]
        back: u32,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Move a file and carry its sync history along
    Mv {
        /// Current vault-relative path
        from: String,

        /// New vault-relative path
        to: String,
    },

    /// Delete a file and drop it from the remote map
    Rm {
        /// Vault-relative path
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_export_paths() {
        let cli = Cli::try_parse_from(["weave", "export", "a.md", "notes/b.md"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Export {
                paths: vec!["a.md".into(), "notes/b.md".into()],
                json: false,
            })
        );
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["weave", "status", "--ledger", "/tmp/l", "--password", "pw"]).unwrap();
        assert_eq!(cli.ledger, Some(PathBuf::from("/tmp/l")));
        assert_eq!(cli.password.as_deref(), Some("pw"));
    }

    #[test]
    fn parse_history_defaults() {
        let cli = Cli::try_parse_from(["weave", "history", "a.md"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::History {
                path: "a.md".into(),
                depth: 10,
                json: false,
            })
        );
    }

    #[test]
    fn show_requires_path() {
        assert!(Cli::try_parse_from(["weave", "show"]).is_err());
    }
}
