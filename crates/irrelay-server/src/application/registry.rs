//! Registry: the relay's in-memory record of devices and subscriptions.
//!
//! Two tables make up all cross-connection state:
//!
//! ```text
//! devices:        "1"  ──► ConnectionHandle (the device's socket)
//!                 "tv" ──► ConnectionHandle
//!
//! subscriptions:  ConnectionId ──► SubscriptionEntry { connection, devices: {"1", "tv"} }
//! ```
//!
//! A connection's role is not fixed.  The same socket may be registered as a
//! device *and* subscribed to other devices; [`Registry::roles_of`] reports
//! both facts independently.
//!
//! # Retained registrations
//!
//! [`Registry::remove_connection`] only drops the connection's subscription
//! entry.  Device entries survive their connection until another `register`
//! for the same identifier evicts them; writes to a stale entry are dropped.
//!
//! The registry itself is a plain struct.  The server shares one instance
//! behind a single `tokio::sync::Mutex` ([`SharedRegistry`]) so every
//! operation observes a consistent snapshot.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Unique identifier assigned to each accepted connection.
pub type ConnectionId = Uuid;

/// The registry as shared between connection tasks.
pub type SharedRegistry = Arc<Mutex<Registry>>;

/// Addressable handle to a live connection.
///
/// Frames pushed through [`ConnectionHandle::send`] are queued on an
/// unbounded channel drained by the connection's writer task, so sending never
/// waits on the peer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl ConnectionHandle {
    /// Creates a handle with a fresh [`ConnectionId`].
    pub fn new(peer: SocketAddr, outbound: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            outbound,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote endpoint, used in log lines.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queues `frame` for delivery.  Returns `false` if the connection's
    /// writer has already shut down.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        self.outbound.send(frame).is_ok()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

/// One subscribing connection and the device identifiers it follows.
#[derive(Debug, Clone)]
pub struct SubscriptionEntry {
    pub connection: ConnectionHandle,
    pub devices: HashSet<String>,
}

/// Both roles a connection may hold at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionRoles {
    /// Device identifiers currently owned by the connection.
    pub registered_as: BTreeSet<String>,
    /// Device identifiers the connection subscribed to.
    pub subscribed_to: BTreeSet<String>,
}

impl ConnectionRoles {
    pub fn is_empty(&self) -> bool {
        self.registered_as.is_empty() && self.subscribed_to.is_empty()
    }
}

/// Device and subscription tables.
#[derive(Debug, Default)]
pub struct Registry {
    devices: HashMap<String, ConnectionHandle>,
    subscriptions: HashMap<ConnectionId, SubscriptionEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new, empty registry for sharing between connection tasks.
    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Makes `connection` the owner of device `id`, returning the evicted
    /// previous owner if there was one.
    pub fn register_device(
        &mut self,
        id: impl Into<String>,
        connection: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        self.devices.insert(id.into(), connection)
    }

    /// Returns the connection currently registered as device `id`.
    pub fn lookup_device(&self, id: &str) -> Option<&ConnectionHandle> {
        self.devices.get(id)
    }

    /// Adds `device` to the subscription set of `connection`, creating the
    /// entry on first use.  Returns `false` if the connection was already
    /// subscribed to `device`.
    pub fn add_subscription(&mut self, connection: &ConnectionHandle, device: &str) -> bool {
        self.subscriptions
            .entry(connection.id())
            .or_insert_with(|| SubscriptionEntry {
                connection: connection.clone(),
                devices: HashSet::new(),
            })
            .devices
            .insert(device.to_string())
    }

    /// Every subscriber connection following `device`, in no particular order.
    pub fn subscribers_of(&self, device: &str) -> Vec<ConnectionHandle> {
        self.subscriptions
            .values()
            .filter(|entry| entry.devices.contains(device))
            .map(|entry| entry.connection.clone())
            .collect()
    }

    /// Drops the subscription entry of `connection`.  Device entries owned by
    /// the connection are kept.
    pub fn remove_connection(&mut self, connection: ConnectionId) -> Option<SubscriptionEntry> {
        self.subscriptions.remove(&connection)
    }

    /// Reports the device identifiers `connection` is registered as and
    /// subscribed to.
    pub fn roles_of(&self, connection: ConnectionId) -> ConnectionRoles {
        let registered_as = self
            .devices
            .iter()
            .filter(|(_, handle)| handle.id() == connection)
            .map(|(id, _)| id.clone())
            .collect();
        let subscribed_to = self
            .subscriptions
            .get(&connection)
            .map(|entry| entry.devices.iter().cloned().collect())
            .unwrap_or_default();

        ConnectionRoles {
            registered_as,
            subscribed_to,
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(port: u16) -> (ConnectionHandle, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        (ConnectionHandle::new(peer, tx), rx)
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = Registry::new();
        assert_eq!(registry.device_count(), 0);
        assert_eq!(registry.subscriber_count(), 0);
        assert!(registry.lookup_device("1").is_none());
    }

    #[test]
    fn test_register_device_last_write_wins() {
        // Arrange
        let mut registry = Registry::new();
        let (c1, _rx1) = make_connection(5001);
        let (c2, _rx2) = make_connection(5002);

        // Act
        let first = registry.register_device("1", c1.clone());
        let evicted = registry.register_device("1", c2.clone());

        // Assert
        assert!(first.is_none());
        assert_eq!(evicted, Some(c1));
        assert_eq!(registry.lookup_device("1"), Some(&c2));
        assert_eq!(registry.device_count(), 1);
    }

    #[test]
    fn test_add_subscription_is_idempotent() {
        let mut registry = Registry::new();
        let (sub, _rx) = make_connection(5003);

        assert!(registry.add_subscription(&sub, "1"));
        assert!(!registry.add_subscription(&sub, "1"));

        assert_eq!(registry.subscriber_count(), 1);
        assert_eq!(registry.subscribers_of("1"), vec![sub]);
    }

    #[test]
    fn test_one_entry_per_connection_across_devices() {
        let mut registry = Registry::new();
        let (sub, _rx) = make_connection(5004);

        registry.add_subscription(&sub, "1");
        registry.add_subscription(&sub, "tv");

        assert_eq!(registry.subscriber_count(), 1);
        assert_eq!(registry.subscribers_of("1").len(), 1);
        assert_eq!(registry.subscribers_of("tv").len(), 1);
        assert!(registry.subscribers_of("2").is_empty());
    }

    #[test]
    fn test_remove_connection_drops_every_subscription() {
        // Arrange
        let mut registry = Registry::new();
        let (sub, _rx) = make_connection(5005);
        let (other, _rx2) = make_connection(5006);
        registry.add_subscription(&sub, "1");
        registry.add_subscription(&sub, "2");
        registry.add_subscription(&other, "1");

        // Act
        let removed = registry.remove_connection(sub.id());

        // Assert
        assert_eq!(removed.map(|entry| entry.devices.len()), Some(2));
        assert_eq!(registry.subscribers_of("1"), vec![other]);
        assert!(registry.subscribers_of("2").is_empty());
    }

    #[test]
    fn test_remove_connection_retains_device_entry() {
        let mut registry = Registry::new();
        let (device, _rx) = make_connection(5007);
        registry.register_device("1", device.clone());

        assert!(registry.remove_connection(device.id()).is_none());

        assert_eq!(registry.lookup_device("1"), Some(&device));
    }

    #[test]
    fn test_roles_of_reports_both_roles() {
        // Arrange: one connection acting as device "1" and subscriber of "2"
        let mut registry = Registry::new();
        let (conn, _rx) = make_connection(5008);
        registry.register_device("1", conn.clone());
        registry.add_subscription(&conn, "2");

        // Act
        let roles = registry.roles_of(conn.id());

        // Assert
        assert_eq!(roles.registered_as, BTreeSet::from(["1".to_string()]));
        assert_eq!(roles.subscribed_to, BTreeSet::from(["2".to_string()]));
    }

    #[test]
    fn test_roles_of_evicted_device_is_empty() {
        let mut registry = Registry::new();
        let (c1, _rx1) = make_connection(5009);
        let (c2, _rx2) = make_connection(5010);
        registry.register_device("1", c1.clone());
        registry.register_device("1", c2);

        assert!(registry.roles_of(c1.id()).is_empty());
    }

    #[test]
    fn test_send_fails_after_receiver_dropped() {
        let (conn, rx) = make_connection(5011);
        assert!(conn.send(b"x\n".to_vec()));

        drop(rx);

        assert!(!conn.send(b"y\n".to_vec()));
    }
}
