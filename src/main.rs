//! Dynamic configuration reload service.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────────┐
//!                  │                 DYNAMIC CONFIG SERVICE                 │
//!                  │                                                        │
//!   POST /site     │  ┌──────────┐   ┌────────────┐   ┌───────────────┐     │
//!  ────────────────┼─▶│   http   │──▶│ allow-list │──▶│  orchestrator │     │
//!                  │  │  server  │   │ (optional) │   └──────┬────────┘     │
//!                  │  └──────────┘   └────────────┘          │              │
//!                  │        ┌──────────────┬─────────────────┼──────────┐   │
//!                  │        ▼              ▼                 ▼          ▼   │
//!                  │  ┌──────────┐  ┌────────────┐  ┌────────────┐ ┌──────┐ │
//!                  │  │collector │  │  staging   │  │ validator  │ │apply │ │
//!                  │  │size gate │  │ temp file  │  │ nginx -t   │ │SIGHUP│ │
//!                  │  └──────────┘  └────────────┘  └────────────┘ └──┬───┘ │
//!                  └──────────────────────────────────────────────────┼─────┘
//!                                                                     ▼
//!                                                            running server
//! ```

use std::path::PathBuf;

use clap::Parser;

use dynamic_config::config::{load_config, ServiceConfig};
use dynamic_config::lifecycle::{startup, Shutdown};
use dynamic_config::observability::logging;

#[derive(Parser)]
#[command(name = "dynamic-config")]
#[command(about = "Validate and hot-apply server configuration pushed over HTTP", long_about = None)]
struct Cli {
    /// Service configuration file (TOML). Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    if cli.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    logging::init(&config.observability);

    tracing::info!("dynamic-config v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        validator = %config.validator.program,
        signal = %config.target.signal,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
