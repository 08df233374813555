//! sessionctl entry point.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sessionstore::tables::SqliteSessionTable;
use sessionstore::{SessionId, SessionStore, SessionTable, StoreConfig, TableStore};
use sessionstore_cli::cli::{Cli, Commands, OutputFormat};
use sessionstore_cli::output::{format_output, format_session, SessionView};
use sessionstore_core::session::is_expired;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessionstore=debug,sessionctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = StoreConfig::from_env();
    if let Some(secret) = cli.secret.clone() {
        config = config.with_secret(secret);
    }
    if let Some(table) = cli.table.clone() {
        config = config.with_table(table);
    }
    // Only `run` keeps the background sweeper
    if cli.command != Commands::Run {
        config = config.with_check_expiration_interval(Duration::ZERO);
    }

    let table = SqliteSessionTable::open(&cli.database)
        .await
        .with_context(|| format!("failed to open {}", cli.database.display()))?
        .with_table_name(config.table_name());

    tracing::debug!(database = %cli.database.display(), ?config, "Opening session store");

    let store = TableStore::builder()
        .with_table(table)
        .with_config(config)
        .build()?;

    match cli.command {
        Commands::Sync => {
            store.sync().await?;
            if !cli.quiet {
                println!("Table '{}' is ready", store.table().table_name());
            }
        }
        Commands::Length => {
            let length = store.length().await?;
            match cli.format {
                OutputFormat::Json => println!("{}", format_output(&length, cli.format)),
                OutputFormat::Pretty => println!("{length} sessions"),
            }
        }
        Commands::Get { sid } => {
            let sid = SessionId::new(sid);
            let row = store.table().find_one(&sid).await?;
            let data = store.get(&sid).await?;

            match row.zip(data) {
                Some((row, data)) => {
                    let view = SessionView {
                        expired: is_expired(&row, chrono::Utc::now()),
                        sid: row.sid.to_string(),
                        expires: row.expires,
                        data,
                    };
                    match cli.format {
                        OutputFormat::Json => println!("{}", format_output(&view, cli.format)),
                        OutputFormat::Pretty => println!("{}", format_session(&view)),
                    }
                }
                None => anyhow::bail!("session {sid} not found"),
            }
        }
        Commands::Destroy { sid } => {
            let sid = SessionId::new(sid);
            store.destroy(&sid).await?;
            if !cli.quiet {
                println!("Destroyed session {sid}");
            }
        }
        Commands::Sweep => {
            let deleted = store.clear_expired().await?;
            match cli.format {
                OutputFormat::Json => println!("{}", format_output(&deleted, cli.format)),
                OutputFormat::Pretty => println!("Removed {deleted} expired sessions"),
            }
        }
        Commands::Run => {
            if !store.is_sweeper_running() {
                anyhow::bail!("expiry sweeper is disabled (check interval is zero)");
            }
            tracing::info!("Expiry sweeper running, press Ctrl+C to stop");

            tokio::signal::ctrl_c()
                .await
                .context("failed to install Ctrl+C handler")?;

            tracing::info!("Shutdown signal received");
            store.close().await;
        }
    }

    Ok(())
}
