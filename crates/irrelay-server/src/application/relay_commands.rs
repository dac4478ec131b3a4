//! RelayService: applies decoded commands to the registry and routes frames.
//!
//! One call per inbound line.  The connection task awaits each call before
//! reading the next line, so commands from one peer are applied in order.
//!
//! | Command                 | Registry effect                 | Written frames                         |
//! |-------------------------|---------------------------------|----------------------------------------|
//! | `subscribe <id>`        | add subscription (if known)     | `success <id>` / `fail device <id> …`  |
//! | `register <id>`         | replace device entry            | none                                   |
//! | `send … <id> <hex>`     | lookup                          | binary transmit frame to the device    |
//! | `<id> <payload>`        | lookup subscribers              | the line, to every subscriber of `<id>` |
//!
//! Frames are only queued after the registry lock is released; a handle
//! cloned out of the registry is all that is needed to write to a peer.

use irrelay_core::protocol::{
    decode_line, encode_failure, encode_forward, encode_success, encode_transmit_frame, Command,
    FailureReason, IrProtocol, ProtocolError,
};
use tracing::{debug, error, info, warn};

use crate::application::registry::{ConnectionHandle, ConnectionRoles, SharedRegistry};

/// What a command did, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Subscribed { device: String },
    /// The device is not registered; a failure line was written back.
    SubscribeRejected { device: String },
    Registered { device: String, evicted: bool },
    Transmitted { device: String, frame_len: usize },
    /// `send` named a device nobody registered; dropped.
    DeviceUnknown { device: String },
    /// `send` carried an unusable code; dropped.
    TransmitRejected { device: String, error: ProtocolError },
    /// A data frame was queued to `recipients` subscribers.
    Forwarded { device: String, recipients: usize },
}

/// Applies relay commands against a shared [`Registry`](crate::application::registry::Registry).
#[derive(Debug, Clone)]
pub struct RelayService {
    registry: SharedRegistry,
}

impl RelayService {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> SharedRegistry {
        SharedRegistry::clone(&self.registry)
    }

    /// Decodes one raw line from `connection` and applies it.
    ///
    /// Returns `None` for empty or undecodable lines; decode failures are
    /// logged and never close the connection.
    pub async fn handle_line(
        &self,
        connection: &ConnectionHandle,
        raw: &[u8],
    ) -> Option<CommandOutcome> {
        match decode_line(raw) {
            Ok(Some(command)) => {
                debug!("{}: {command}", connection.peer());
                Some(self.handle_command(connection, command).await)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("{}: ignoring line: {e}", connection.peer());
                None
            }
        }
    }

    /// Applies a decoded [`Command`] on behalf of `connection`.
    pub async fn handle_command(
        &self,
        connection: &ConnectionHandle,
        command: Command,
    ) -> CommandOutcome {
        match command {
            Command::Subscribe { device } => self.subscribe(connection, device).await,
            Command::Register { device } => self.register(connection, device).await,
            Command::Send {
                protocol,
                repeat_count,
                num_bits,
                device,
                code,
            } => {
                self.transmit(protocol, repeat_count, num_bits, device, &code)
                    .await
            }
            Command::Forward { device, line } => self.forward(device, &line).await,
        }
    }

    /// Releases everything `connection` held and returns the roles it had.
    pub async fn disconnect(&self, connection: &ConnectionHandle) -> ConnectionRoles {
        let mut registry = self.registry.lock().await;
        let roles = registry.roles_of(connection.id());
        registry.remove_connection(connection.id());
        roles
    }

    async fn subscribe(&self, connection: &ConnectionHandle, device: String) -> CommandOutcome {
        // Lookup and insert under one guard so a concurrent register/teardown
        // cannot interleave.
        let known = {
            let mut registry = self.registry.lock().await;
            let known = registry.lookup_device(&device).is_some();
            if known {
                registry.add_subscription(connection, &device);
            }
            known
        };

        if known {
            info!("{} subscribed to device {device}", connection.peer());
            connection.send(encode_success(&device));
            CommandOutcome::Subscribed { device }
        } else {
            warn!(
                "{} tried to subscribe to unregistered device {device}",
                connection.peer()
            );
            connection.send(encode_failure(&device, FailureReason::NotRegistered));
            CommandOutcome::SubscribeRejected { device }
        }
    }

    async fn register(&self, connection: &ConnectionHandle, device: String) -> CommandOutcome {
        let evicted = self
            .registry
            .lock()
            .await
            .register_device(device.clone(), connection.clone());

        match &evicted {
            Some(previous) if previous != connection => info!(
                "{} registered as device {device}, replacing {}",
                connection.peer(),
                previous.peer()
            ),
            _ => info!("{} registered as device {device}", connection.peer()),
        }

        CommandOutcome::Registered {
            device,
            evicted: evicted.is_some_and(|previous| &previous != connection),
        }
    }

    async fn transmit(
        &self,
        protocol: IrProtocol,
        repeat_count: u8,
        num_bits: u8,
        device: String,
        code: &str,
    ) -> CommandOutcome {
        let target = self.registry.lock().await.lookup_device(&device).cloned();
        let Some(target) = target else {
            warn!("send to unregistered device {device} dropped");
            return CommandOutcome::DeviceUnknown { device };
        };

        let frame = match encode_transmit_frame(protocol, repeat_count, num_bits, code) {
            Ok(frame) => frame,
            Err(error) => {
                error!("send to device {device} dropped: {error}");
                return CommandOutcome::TransmitRejected { device, error };
            }
        };

        let frame_len = frame.len();
        if !target.send(frame) {
            debug!("device {device} at {} is gone; transmit frame dropped", target.peer());
        }
        CommandOutcome::Transmitted { device, frame_len }
    }

    async fn forward(&self, device: String, line: &str) -> CommandOutcome {
        let subscribers = self.registry.lock().await.subscribers_of(&device);

        let frame = encode_forward(line);
        for subscriber in &subscribers {
            if !subscriber.send(frame.clone()) {
                debug!("subscriber {} is gone; frame dropped", subscriber.peer());
            }
        }
        debug!("forwarded {line:?} to {} subscriber(s)", subscribers.len());

        CommandOutcome::Forwarded {
            device,
            recipients: subscribers.len(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
