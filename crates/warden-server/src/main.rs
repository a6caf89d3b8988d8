//! `warden` binary

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use warden_server::{ServerConfig, Warden};

/// Stateless bearer-token authentication server
#[derive(Parser, Debug)]
#[command(name = "warden", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind, overriding the file
    #[arg(long)]
    bind: Option<String>,

    /// Port to bind, overriding the file
    #[arg(short, long)]
    port: Option<u16>,

    /// Log filter, overriding the file
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// Load configuration and keys, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ServerConfig::from_env().context("failed to load configuration")?,
    };
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json_logs {
        config.logging.structured = true;
    }
    config.validate()?;

    config
        .logging
        .init()
        .context("failed to initialise logging")?;
    warden_auth::metrics::init_metrics();

    let warden = Warden::from_config(config, cli.config)?;
    if cli.check {
        info!("Configuration OK");
        return Ok(());
    }

    warden.serve(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
