//! IR relay subscriber entry point.
//!
//! ```text
//! irrelay-subscriber [OPTIONS] [COMMAND]
//!
//! Commands:
//!   run   Subscribe to the configured devices and run handlers (default)
//!   send  Ask a device to transmit an IR code, then exit
//!
//! Options:
//!   --config <PATH>        Config file [default: <config dir>/irrelay/subscriber.toml]
//!   --host <HOST>          Relay host, overrides the config file
//!   --port <PORT>          Relay port, overrides the config file
//!   --echo                 Log received signals instead of running handlers
//!   --repeat-delay <N>     Global repeat threshold, overrides the config file
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use irrelay_core::protocol::{Command, IrProtocol};
use irrelay_core::RepeatDebouncer;
use irrelay_subscriber::application::dispatch_handler::HandlerDispatcher;
use irrelay_subscriber::application::handle_signals::SubscriberSession;
use irrelay_subscriber::infrastructure::action_executor::xdotool::XdotoolExecutor;
use irrelay_subscriber::infrastructure::network::{send_once, NetworkEvent, SubscriberConnection};
use irrelay_subscriber::infrastructure::storage::config::{load_config, SubscriberConfig};

/// How often the event loop checks the shutdown flag while idle.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(200);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Turns IR remote button presses relayed by irrelay-server into desktop actions.
#[derive(Debug, Parser)]
#[command(name = "irrelay-subscriber", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Relay host name or IP address.
    #[arg(long, env = "IRRELAY_HOST")]
    host: Option<String>,

    /// Relay TCP port.
    #[arg(long, env = "IRRELAY_PORT")]
    port: Option<u16>,

    /// Log received signals instead of running handlers.
    #[arg(long)]
    echo: bool,

    /// Number of repeat frames to skip before a held button fires again.
    #[arg(long)]
    repeat_delay: Option<u32>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum CliCommand {
    /// Subscribe to the configured devices and run handlers.
    Run,
    /// Ask a device to transmit an IR code, then exit.
    Send {
        /// NEC, RC5 or RCMM.
        #[arg(value_parser = parse_protocol)]
        protocol: IrProtocol,
        repeat_count: u8,
        num_bits: u8,
        device: String,
        /// Hex code, e.g. 40BD01FE.
        code: String,
    },
}

fn parse_protocol(token: &str) -> Result<IrProtocol, String> {
    IrProtocol::from_token(&token.to_ascii_uppercase())
        .ok_or_else(|| format!("unknown IR protocol {token:?} (expected NEC, RC5 or RCMM)"))
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    fn load(&self) -> anyhow::Result<SubscriberConfig> {
        let mut config = load_config(self.config.as_deref()).context("failed to load config")?;
        if let Some(host) = &self.host {
            config.connection.host = host.clone();
        }
        if let Some(port) = self.port {
            config.connection.port = port;
        }
        if let Some(delay) = self.repeat_delay {
            config.subscriber.repeat_delay = delay;
        }
        config.subscriber.echo_mode |= self.echo;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.subscriber.log_level)),
        )
        .init();

    match cli.command {
        Some(CliCommand::Send {
            protocol,
            repeat_count,
            num_bits,
            device,
            code,
        }) => {
            let command = Command::Send {
                protocol,
                repeat_count,
                num_bits,
                device,
                code,
            };
            send_once(&config.connection.host, config.connection.port, &command)
                .await
                .context("failed to send transmit request")?;
            info!("sent {command}");
            Ok(())
        }
        Some(CliCommand::Run) | None => run(config).await,
    }
}

async fn run(config: SubscriberConfig) -> anyhow::Result<()> {
    let codemap = config.build_codemap().context("failed to load codemap")?;
    let keymaps = config.build_keymaps().context("invalid keymap")?;
    if keymaps.is_empty() && !config.subscriber.echo_mode {
        warn!("no keymaps configured; signals will only be logged as errors");
    }

    let mut session = SubscriberSession::new(
        RepeatDebouncer::new(codemap, keymaps, config.subscriber.repeat_delay),
        HandlerDispatcher::new(Arc::new(XdotoolExecutor::new())),
        config.subscriber.echo_mode,
    );

    let connection_config = config.connection_config();
    if connection_config.devices.is_empty() {
        warn!("no devices to subscribe to; set [subscriber] devices or add a keymap");
    }
    info!(
        "subscribing to {:?} on {}",
        connection_config.devices,
        connection_config.server_addr()
    );

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

    let connection = Arc::new(SubscriberConnection::new(connection_config));
    let mut events = Arc::clone(&connection).start(Arc::clone(&running)).await;

    while running.load(Ordering::Relaxed) {
        match tokio::time::timeout(EVENT_POLL_INTERVAL, events.recv()).await {
            Ok(Some(event)) => handle_event(&mut session, event),
            Ok(None) => break,
            Err(_) => continue,
        }
    }

    info!("subscriber stopped");
    Ok(())
}

/// Applies one network event to the session.
fn handle_event(session: &mut SubscriberSession, event: NetworkEvent) {
    match event {
        NetworkEvent::Connected { server_addr } => {
            session.reset();
            info!("session started with relay {server_addr}");
        }
        NetworkEvent::Line(line) => {
            session.handle_server_line(line);
        }
        NetworkEvent::Disconnected => {
            session.reset();
            warn!("lost connection to relay");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
