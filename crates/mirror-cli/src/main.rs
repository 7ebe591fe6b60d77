//! etcd-mirror
//!
//! Mirrors one or more etcd subtrees into local directories.
//!
//! # Usage
//!
//! ```bash
//! etcd-mirror --mirror /stiitops=/run/power/stiitops
//! etcd-mirror --config /etc/etcd-mirror.toml
//! ```
//!
//! # Environment Variables
//!
//! - `ETCD_HOST`, `ETCD_PORT`: where to reach etcd (default `127.0.0.1:2379`)
//! - `RUST_LOG`: log verbosity (default `info`)

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use mirror_cli::{Cli, CliError, Config, Result, Supervisor, logging};
use mirror_etcd::EtcdClient;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose)
        .map_err(|e| CliError::user(format!("Failed to set up logging: {}", e)))?;

    let config = Config::resolve(&cli)?;
    let endpoint = config.store.endpoint_url();
    let client = Arc::new(EtcdClient::new(&endpoint)?);
    let supervisor = Supervisor::new(client, &config)?;

    tracing::info!(%endpoint, mirrors = config.mirrors.len(), "Starting etcd-mirror");

    let stop = supervisor.stop_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received; stopping mirrors");
                stop.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    supervisor.run().await?;
    tracing::info!("All mirrors stopped");
    Ok(())
}
