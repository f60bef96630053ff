//! sdtd-console: query a 7 Days to Die server over its telnet console
//!
//! Prints the result as JSON on stdout; logs go to stderr. With `--watch`
//! the query repeats until Ctrl-C, and a failed poll is retried on the next
//! tick.

use anyhow::Result;
use clap::{Parser, Subcommand};
use sdtd_core::ConsoleError;
use sdtd_telnet::{StatusProvider, TelnetConfig, TelnetConsole};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "7 Days to Die telnet console client", long_about = None)]
struct Cli {
    /// Console address (host:port). Defaults to SERVER_ADDR.
    #[arg(long)]
    address: Option<String>,
    /// Telnet password. Defaults to TELNET_PASS.
    #[arg(long)]
    password: Option<String>,
    /// Repeat the query every SECS seconds until interrupted.
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,
    #[command(subcommand)]
    query: Query,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Query {
    /// List online players
    Players,
    /// Show the in-game time
    Time,
    /// Show the in-game time and who is online
    Status,
}

async fn run_query(console: &TelnetConsole, query: Query) -> Result<String> {
    let json = match query {
        Query::Players => serde_json::to_string_pretty(&console.list_players().await?)?,
        Query::Time => serde_json::to_string_pretty(&console.game_time().await?)?,
        Query::Status => serde_json::to_string_pretty(&console.status().await?)?,
    };
    Ok(json)
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ConsoleError>(),
        Some(ConsoleError::Cancelled)
    )
}

/// Flip the returned signal to `true` once `interrupt` fires
fn cancel_on<F>(interrupt: F) -> watch::Receiver<bool>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        match interrupt.await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                let _ = cancel_tx.send(true);
            }
            Err(e) => {
                warn!("Cannot listen for Ctrl-C: {}", e);
                // Hold the sender so pollers keep running
                std::future::pending::<()>().await;
                drop(cancel_tx);
            }
        }
    });
    cancel_rx
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = TelnetConfig::from_env();
    if let Some(address) = cli.address {
        config.address = address;
    }
    if let Some(password) = cli.password {
        config.password = password;
    }

    let cancel_rx = cancel_on(tokio::signal::ctrl_c());

    let console = TelnetConsole::new(config).with_cancellation(cancel_rx.clone());

    let Some(secs) = cli.watch else {
        println!("{}", run_query(&console, cli.query).await?);
        return Ok(());
    };

    info!(
        "Polling {} every {}s",
        console.config().address,
        secs.max(1)
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    let mut stop = cancel_rx;

    loop {
        tokio::select! {
            Ok(_) = stop.wait_for(|&c| c) => break,
            _ = ticker.tick() => match run_query(&console, cli.query).await {
                Ok(json) => println!("{}", json),
                Err(e) if is_cancelled(&e) => break,
                Err(e) => warn!("Query failed: {:#}", e),
            },
        }
    }

    Ok(())
}
