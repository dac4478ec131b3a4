//! Network infrastructure for the subscriber.
//!
//! Handles the TCP connection to the relay server and hands decoded
//! [`ServerLine`]s to the application layer.
//!
//! - `SubscriberConnection` owns the socket and reconnects after
//!   `reconnect_interval` whenever it drops, until shutdown.
//! - After every (re)connect it sends `subscribe <id>` for each configured
//!   device, so subscriptions survive a relay restart.
//! - A device the relay has not confirmed with `success <id>` is subscribed
//!   again every `reconnect_interval`, so a subscriber started before its
//!   device registers picks it up once it does.
//! - Inbound lines are decoded and forwarded on an `mpsc` channel as
//!   [`NetworkEvent`]s.
//! - `send` requests go out on the same socket.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use irrelay_core::protocol::{decode_server_line, Command, IrProtocol, ServerLine};
use irrelay_core::DEFAULT_PORT;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{mpsc, Mutex},
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

/// Lower bound on the subscription retry period.
const MIN_SUBSCRIBE_RETRY: Duration = Duration::from_millis(100);

/// Errors that can occur in the subscriber network layer.
#[derive(Debug, Error)]
pub enum SubscriberNetworkError {
    #[error("failed to connect to relay at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not connected to the relay")]
    NotConnected,

    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the subscriber's relay connection.
#[derive(Debug, Clone)]
pub struct SubscriberConnectionConfig {
    /// Relay host name or IP address.
    pub host: String,
    pub port: u16,
    /// Devices to subscribe to after every connect.
    pub devices: Vec<String>,
    /// Pause between connection attempts.
    pub reconnect_interval: Duration,
}

impl SubscriberConnectionConfig {
    /// `host:port`, for log lines and errors.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SubscriberConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            devices: Vec::new(),
            reconnect_interval: Duration::from_secs(5),
        }
    }
}

/// Events emitted by the network layer to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The TCP connection was established and subscriptions were sent.
    Connected { server_addr: SocketAddr },
    /// A line was received from the relay.
    Line(ServerLine),
    /// The TCP connection was lost.
    Disconnected,
}

/// Manages the TCP connection from the subscriber to the relay.
pub struct SubscriberConnection {
    config: SubscriberConnectionConfig,
    write_half: Arc<Mutex<Option<OwnedWriteHalf>>>,
}

impl SubscriberConnection {
    /// Creates a new (not yet connected) `SubscriberConnection`.
    pub fn new(config: SubscriberConnectionConfig) -> Self {
        Self {
            config,
            write_half: Arc::new(Mutex::new(None)),
        }
    }

    /// Connects to the relay and begins reading lines.
    ///
    /// Returns a channel receiver that delivers [`NetworkEvent`]s.  The
    /// reconnect loop runs until `running` is cleared or the receiver is
    /// dropped.
    pub async fn start(self: Arc<Self>, running: Arc<AtomicBool>) -> mpsc::Receiver<NetworkEvent> {
        let (tx, rx) = mpsc::channel(128);
        let this = Arc::clone(&self);

        tokio::spawn(async move {
            let server = this.config.server_addr();
            while running.load(Ordering::Relaxed) && !tx.is_closed() {
                match TcpStream::connect((this.config.host.as_str(), this.config.port)).await {
                    Ok(stream) => {
                        this.serve(stream, &tx).await;
                        info!(
                            "disconnected from relay; reconnecting in {:?}",
                            this.config.reconnect_interval
                        );
                    }
                    Err(e) => warn!("could not connect to relay at {server}: {e}"),
                }

                if running.load(Ordering::Relaxed) {
                    time::sleep(this.config.reconnect_interval).await;
                }
            }
        });

        rx
    }

    /// Runs one connected session: subscribe, read until EOF, clean up.
    async fn serve(&self, stream: TcpStream, tx: &mpsc::Sender<NetworkEvent>) {
        // Repeat timing must survive the trip; no coalescing of small writes.
        if let Err(e) = stream.set_nodelay(true) {
            warn!("could not disable Nagle's algorithm: {e}");
        }
        let server_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("connected socket has no peer address: {e}");
                return;
            }
        };
        info!("connected to relay at {server_addr}");

        let (read_half, write_half) = stream.into_split();
        *self.write_half.lock().await = Some(write_half);

        for device in &self.config.devices {
            if let Err(e) = self.subscribe(device).await {
                error!("failed to subscribe to device {device}: {e}");
            }
        }
        if tx.send(NetworkEvent::Connected { server_addr }).await.is_ok() {
            self.read_loop(read_half, tx).await;
        }

        *self.write_half.lock().await = None;
        let _ = tx.send(NetworkEvent::Disconnected).await;
    }

    /// Reads lines from the relay and forwards them on `tx`.
    ///
    /// Devices without a `success` reply are re-subscribed on every retry
    /// tick until the relay confirms them.
    async fn read_loop(&self, read_half: OwnedReadHalf, tx: &mpsc::Sender<NetworkEvent>) {
        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::with_capacity(128);
        let mut unconfirmed: BTreeSet<String> = self.config.devices.iter().cloned().collect();

        let period = self.config.reconnect_interval.max(MIN_SUBSCRIBE_RETRY);
        let mut retry = time::interval_at(Instant::now() + period, period);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // `read_until` keeps partial input in `buf` when cancelled.
                read = reader.read_until(b'\n', &mut buf) => {
                    match read {
                        Ok(0) => break,
                        Ok(_) => {}
                        Err(e) => {
                            error!("read error on relay connection: {e}");
                            break;
                        }
                    }

                    let text = String::from_utf8_lossy(&buf).into_owned();
                    buf.clear();
                    match decode_server_line(&text) {
                        Ok(Some(line)) => {
                            if let ServerLine::Subscribed { device } = &line {
                                unconfirmed.remove(device);
                            }
                            if tx.send(NetworkEvent::Line(line)).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => error!("unable to extract device/data: {e}"),
                    }
                }
                _ = retry.tick(), if !unconfirmed.is_empty() => {
                    for device in &unconfirmed {
                        debug!("retrying subscription to device {device}");
                        if let Err(e) = self.subscribe(device).await {
                            warn!("failed to resubscribe to device {device}: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Writes `command` as one line on the current connection.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberNetworkError::NotConnected`] between connections
    /// and [`SubscriberNetworkError::Io`] if the write fails.
    pub async fn send_command(&self, command: &Command) -> Result<(), SubscriberNetworkError> {
        let line = format!("{command}\n");
        let mut guard = self.write_half.lock().await;
        let writer = guard.as_mut().ok_or(SubscriberNetworkError::NotConnected)?;
        writer.write_all(line.as_bytes()).await?;
        debug!("sent {}", line.trim_end());
        Ok(())
    }

    /// Requests forwarding of `device`'s signals.
    ///
    /// # Errors
    ///
    /// See [`SubscriberConnection::send_command`].
    pub async fn subscribe(&self, device: &str) -> Result<(), SubscriberNetworkError> {
        self.send_command(&Command::Subscribe {
            device: device.to_string(),
        })
        .await
    }

    /// Asks the relay to have `device` transmit `code`.
    ///
    /// # Errors
    ///
    /// See [`SubscriberConnection::send_command`].
    pub async fn send(
        &self,
        protocol: IrProtocol,
        repeat_count: u8,
        num_bits: u8,
        device: &str,
        code: &str,
    ) -> Result<(), SubscriberNetworkError> {
        self.send_command(&Command::Send {
            protocol,
            repeat_count,
            num_bits,
            device: device.to_string(),
            code: code.to_string(),
        })
        .await
    }
}

/// Connects, writes one command line, and closes the connection.
///
/// # Errors
///
/// Returns [`SubscriberNetworkError::ConnectFailed`] if the relay cannot be
/// reached and [`SubscriberNetworkError::Io`] if the write fails.
pub async fn send_once(host: &str, port: u16, command: &Command) -> Result<(), SubscriberNetworkError> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|source| SubscriberNetworkError::ConnectFailed {
            addr: format!("{host}:{port}"),
            source,
        })?;
    stream.set_nodelay(true)?;
    stream.write_all(format!("{command}\n").as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
