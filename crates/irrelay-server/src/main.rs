//! IR relay server entry point.
//!
//! ```text
//! irrelay-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>  Config file [default: <config dir>/irrelay/server.toml]
//!   --bind   <ADDR>  Listen address, overrides the config file
//!   --port   <PORT>  Listen port, overrides the config file
//! ```
//!
//! `IRRELAY_BIND` and `IRRELAY_PORT` may be used instead of the flags.  The
//! log level comes from `RUST_LOG`, falling back to `log_level` in the config.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use irrelay_server::infrastructure::network::RelayServer;
use irrelay_server::infrastructure::storage::config::{load_config, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Relays IR signals from devices to subscribers and transmit requests back.
#[derive(Debug, Parser)]
#[command(name = "irrelay-server", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// IP address to listen on.
    #[arg(long, env = "IRRELAY_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "IRRELAY_PORT")]
    port: Option<u16>,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = load_config(self.config.as_deref()).context("failed to load config")?;
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let addr = config.socket_addr()?;
    let server = RelayServer::bind(addr)
        .await
        .with_context(|| format!("failed to start relay on {addr}"))?
        .with_max_line_length(config.server.max_line_length);

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    server.run(running).await;

    info!("relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
