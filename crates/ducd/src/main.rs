//! ducd - DUC polling daemon
//!
//! Logs in to a DUC building-automation controller, builds the sensor
//! catalog and reports formatted readings every poll interval.
//!
//! Usage:
//!   ducd [OPTIONS]
//!
//! Stops on Ctrl-C, or with a non-zero exit status when the controller
//! can no longer be read.

mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use duc_bridge::{CatalogBuilder, LogSink, Poller};
use duc_client::DucClient;

use crate::config::Config;
use crate::logging::LogFormat;

#[derive(Parser)]
#[command(name = "ducd")]
#[command(author, version, about = "Poll a DUC controller and report its sensors")]
struct Cli {
    /// Configuration file (.yaml, .yml, .json or .toml)
    #[arg(short, long, env = "DUCD_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Log output format
    #[arg(short, long, value_enum, default_value = "coloured")]
    logging: LogFormat,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Less log output (-q warn, -qq error)
    #[arg(short, long, action = ArgAction::Count)]
    quiet: u8,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.logging, cli.verbose, cli.quiet);

    tracing::info!("Starting ducd {}", env!("CARGO_PKG_VERSION"));

    tracing::info!("Loading config from: {}", cli.config.display());
    let config = Config::load(&cli.config)?;

    let mut client = DucClient::connect(&config.duc.url)
        .await
        .context("Failed to connect to DUC")?;

    match client.version().await {
        Ok(version) => tracing::info!(parent: client.span(), %version, "DUC version"),
        Err(e) => tracing::warn!(parent: client.span(), error = %e, "Cannot read DUC version"),
    }

    let catalog = CatalogBuilder::new(config.duc.disallowed_prefixes.iter().cloned())
        .with_span(tracing::info_span!(parent: client.span(), "catalog"))
        .build(&mut client)
        .await
        .context("Failed to browse DUC points")?;
    tracing::info!(
        device = %catalog.device_id(),
        sensors = catalog.len(),
        "Catalog ready"
    );

    let poller = Poller::new(config.interval())
        .with_span(tracing::info_span!(parent: client.span(), "poller"));
    let sink = LogSink::new().with_span(tracing::info_span!("sink"));

    if cli.once {
        let report = poller
            .poll_once(&mut client, &catalog, &sink)
            .await
            .context("Failed to read DUC values")?;
        tracing::info!(
            published = report.published.len(),
            failed = report.failed.len(),
            unknown = report.unknown.len(),
            "Poll cycle finished"
        );
        return Ok(());
    }

    tracing::info!("Polling every {:?}", poller.interval());
    poller
        .run_until(&mut client, &catalog, &sink, shutdown_signal())
        .await
        .context("Failed to read DUC values")?;

    tracing::info!("ducd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
