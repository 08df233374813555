//! CLI command definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Inspect and maintain a SQLite session table.
#[derive(Debug, Parser)]
#[command(name = "sessionctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, short, env = "SESSION_DATABASE", default_value = "sessions.db")]
    pub database: PathBuf,

    /// Session table name (default: Sessions).
    #[arg(long, short, env = "SESSION_TABLE")]
    pub table: Option<String>,

    /// Secret used to encrypt session data.
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Output format.
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,

    /// Suppress non-essential output.
    #[arg(long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Raw JSON output.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Available commands.
#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Create the session table if it does not exist.
    Sync,
    /// Count stored sessions, expired ones included.
    Length,
    /// Show a session and its decrypted payload.
    Get {
        /// Session ID.
        sid: String,
    },
    /// Delete a session.
    Destroy {
        /// Session ID.
        sid: String,
    },
    /// Delete expired sessions once.
    Sweep,
    /// Run the expiry sweeper until Ctrl+C.
    Run,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_with_defaults() {
        let cli = Cli::try_parse_from(["sessionctl", "get", "abc"]).unwrap();

        assert_eq!(
            cli.command,
            Commands::Get {
                sid: "abc".to_string()
            }
        );
        assert_eq!(cli.format, OutputFormat::Pretty);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_parse_global_options() {
        let cli = Cli::try_parse_from([
            "sessionctl",
            "--database",
            "/tmp/app.db",
            "--table",
            "web_sessions",
            "--format",
            "json",
            "sweep",
        ])
        .unwrap();

        assert_eq!(cli.database, PathBuf::from("/tmp/app.db"));
        assert_eq!(cli.table.as_deref(), Some("web_sessions"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.command, Commands::Sweep);
    }

    #[test]
    fn test_get_requires_sid() {
        assert!(Cli::try_parse_from(["sessionctl", "get"]).is_err());
    }
}
