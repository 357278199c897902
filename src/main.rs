use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;

use poolctl::config::Config;
use poolctl::logging::init_tracing;
use poolctl::provision::ident::quote_identifier;
use poolctl::provision::PgConnector;
use poolctl::reconcile::{run_with_store_files, PassReport};
use poolctl::service::{ServiceIntent, StateFile};

#[derive(Debug, Parser)]
#[command(name = "poolctl", version, about = "Reconcile PgBouncer with its PostgreSQL backends and clients")]
struct Cli {
    /// Configuration file (default: $POOLCTL_CONFIG or ~/.config/poolctl/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one reconciliation pass and print the decision as JSON
    Reconcile,
    /// Run a pass now and on every SIGHUP until interrupted
    Watch,
    /// Enable the service
    Start,
    /// Disable the service
    Stop,
    /// Print a name quoted as a PostgreSQL identifier
    QuoteIdent { name: String },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run_once(config_path: Option<&Path>) -> Result<PassReport> {
    let config = load_config(config_path)?;
    let connector = PgConnector::new(Duration::from_secs(u64::from(
        config.defaults.connect_timeout_seconds,
    )));
    run_with_store_files(&config, &connector)
        .await
        .context("reconciliation pass failed")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{json}");
    Ok(())
}

/// Passes run one at a time; hangups arriving mid-pass collapse into a
/// single pending pass.
async fn watch(config_path: Option<&Path>) -> Result<()> {
    let trigger = Arc::new(Notify::new());
    trigger.notify_one();

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let hangup_trigger = Arc::clone(&trigger);
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::debug!("SIGHUP received, scheduling pass");
            hangup_trigger.notify_one();
        }
    });

    loop {
        tokio::select! {
            _ = trigger.notified() => {
                match run_once(config_path).await {
                    Ok(report) => print_json(&report)?,
                    Err(e) => tracing::error!(error = %format!("{e:#}"), "Pass failed, waiting for next trigger"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
            _ = terminate.recv() => break,
        }
    }

    tracing::info!("Shutting down");
    Ok(())
}

fn operator(config_path: Option<&Path>, intent: ServiceIntent) -> Result<()> {
    let config = load_config(config_path)?;
    let (state, action) = StateFile::new(&config.paths.state_file)
        .dispatch(intent)
        .context("failed to update service state")?;
    print_json(&serde_json::json!({
        "state": state,
        "message": state.message(),
        "action": action,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Reconcile => print_json(&run_once(config_path).await?),
        Command::Watch => watch(config_path).await,
        Command::Start => operator(config_path, ServiceIntent::PackageInstalled),
        Command::Stop => operator(config_path, ServiceIntent::Stopped),
        Command::QuoteIdent { name } => {
            println!("{}", quote_identifier(&name));
            Ok(())
        }
    }
}
