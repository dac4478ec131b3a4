//! RelayServer: TCP accept loop and per-connection tasks.
//!
//! Every accepted socket gets two tasks:
//!
//! ```text
//!            ┌──────────── reader (this task) ────────────┐
//! socket ──► │ read_line_bounded ──► RelayService::handle_line │
//!            └────────────────────────────────────────────┘
//!                                │ ConnectionHandle::send (any task)
//!                                ▼
//!            ┌──────────── writer task ───────────────────┐
//! socket ◄── │ mpsc::UnboundedReceiver ──► write_all       │
//!            └────────────────────────────────────────────┘
//! ```
//!
//! The writer drains an unbounded channel, so relay logic never waits on a
//! slow peer.  When the reader hits EOF the writer flushes whatever is still
//! queued, then shuts down its half of the socket.  `TCP_NODELAY` is set on every socket: subscribers infer how
//! long a button is held from the spacing of successive `repeat` frames.
//!
//! The accept loop polls the shared `running` flag every 200 ms and returns
//! once it is cleared.

use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::registry::{ConnectionHandle, Registry, SharedRegistry};
use crate::application::relay_commands::RelayService;

/// Longest accepted inbound line when none is configured.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long teardown waits for queued frames to reach a peer.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors raised while setting up the relay listener.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("could not read listener address: {0}")]
    LocalAddr(#[source] io::Error),
}

/// A bound relay listener plus the registry it serves.
pub struct RelayServer {
    listener: TcpListener,
    service: Arc<RelayService>,
    max_line_length: usize,
}

impl RelayServer {
    /// Binds the relay listener on `addr` with a fresh, empty registry.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::BindFailed`] if the address is in use or not
    /// permitted.
    pub async fn bind(addr: SocketAddr) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::BindFailed { addr, source })?;

        Ok(Self {
            listener,
            service: Arc::new(RelayService::new(Registry::shared())),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        })
    }

    /// Sets the longest inbound line accepted; longer lines are discarded.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length.max(1);
        self
    }

    /// The address actually bound (useful with port `0`).
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::LocalAddr`] if the OS cannot report it.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        self.listener.local_addr().map_err(RelayError::LocalAddr)
    }

    /// Handle to the registry shared by all connections.
    pub fn registry(&self) -> SharedRegistry {
        self.service.registry()
    }

    /// Accepts connections until `running` is set to `false`.
    ///
    /// Connections already open keep being served by their own tasks.
    pub async fn run(self, running: Arc<AtomicBool>) {
        match self.listener.local_addr() {
            Ok(addr) => info!("relay listening on {addr}"),
            Err(e) => warn!("relay listening (address unavailable: {e})"),
        }

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    info!("connection from {peer}");
                    let service = Arc::clone(&self.service);
                    let max_line_length = self.max_line_length;
                    tokio::spawn(async move {
                        handle_connection(stream, peer, service, max_line_length).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient (e.g. file descriptor exhaustion); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {}
            }
        }
    }
}

// ── Per-connection handling ───────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: Arc<RelayService>,
    max_line_length: usize,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("{peer}: could not disable Nagle's algorithm: {e}");
    }

    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = ConnectionHandle::new(peer, tx);
    let (stop_tx, stop_rx) = oneshot::channel();
    let writer = tokio::spawn(write_frames(write_half, rx, stop_rx, peer));

    match read_commands(read_half, &connection, &service, max_line_length).await {
        Ok(()) => info!("{peer} disconnected"),
        Err(e) => warn!("{peer}: connection error: {e}"),
    }

    let roles = service.disconnect(&connection).await;
    if !roles.is_empty() {
        info!(
            "{peer} released (registered as {:?}, subscribed to {:?})",
            roles.registered_as, roles.subscribed_to
        );
    }

    // Retained device entries keep senders alive, so the channel never closes
    // on its own.
    let _ = stop_tx.send(());
    finish_writer(writer, peer).await;
}

async fn finish_writer(mut writer: JoinHandle<()>, peer: SocketAddr) {
    match timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("{peer}: writer task failed: {e}"),
        Err(_) => {
            warn!("{peer}: pending frames not flushed within {WRITER_DRAIN_TIMEOUT:?}");
            writer.abort();
        }
    }
}

async fn read_commands(
    read_half: OwnedReadHalf,
    connection: &ConnectionHandle,
    service: &RelayService,
    max_line_length: usize,
) -> io::Result<()> {
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::with_capacity(128);

    loop {
        match read_line_bounded(&mut reader, &mut line, max_line_length).await? {
            LineRead::Line => {
                service.handle_line(connection, &line).await;
            }
            LineRead::TooLong => {
                warn!(
                    "{}: discarded line longer than {max_line_length} bytes",
                    connection.peer()
                );
            }
            LineRead::Eof => return Ok(()),
        }
    }
}

/// Writes queued frames until `stop` fires, then flushes the backlog and
/// shuts down the write half.
async fn write_frames(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    mut stop: oneshot::Receiver<()>,
    peer: SocketAddr,
) {
    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = writer.write_all(&frame).await {
                        debug!("{peer}: write failed: {e}");
                        return;
                    }
                }
                None => break,
            },
            _ = &mut stop => {
                while let Ok(frame) = rx.try_recv() {
                    if let Err(e) = writer.write_all(&frame).await {
                        debug!("{peer}: write failed while flushing: {e}");
                        return;
                    }
                }
                break;
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("{peer}: shutdown failed: {e}");
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    TooLong,
    Eof,
}

/// Reads one `\n`-terminated line into `buf` (terminator included).
///
/// A line longer than `max` bytes is consumed up to and including its
/// terminator and reported as [`LineRead::TooLong`].  A final line without a
/// terminator is returned as a normal line.
async fn read_line_bounded<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = u64::try_from(max).unwrap_or(u64::MAX).saturating_add(1);
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.last() == Some(&b'\n') || buf.len() <= max {
        return Ok(LineRead::Line);
    }

    loop {
        let (consumed, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(LineRead::TooLong);
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(consumed);
        if done {
            return Ok(LineRead::TooLong);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(input: &[u8], max: usize) -> Vec<(LineRead, Vec<u8>)> {
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();
        let mut out = Vec::new();
        loop {
            let read = read_line_bounded(&mut reader, &mut buf, max).await.unwrap();
            if read == LineRead::Eof {
                return out;
            }
            out.push((read, buf.clone()));
        }
    }

    #[tokio::test]
    async fn test_read_line_bounded_splits_lines() {
        let lines = read_all(b"register 1\r\n1 repeat\n", 64).await;

        assert_eq!(
            lines,
            vec![
                (LineRead::Line, b"register 1\r\n".to_vec()),
                (LineRead::Line, b"1 repeat\n".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_line_bounded_returns_unterminated_tail() {
        let lines = read_all(b"1 40BD01FE", 64).await;
        assert_eq!(lines, vec![(LineRead::Line, b"1 40BD01FE".to_vec())]);
    }

    #[tokio::test]
    async fn test_read_line_bounded_discards_overlong_line_and_recovers() {
        // Arrange: 20-byte garbage line followed by a valid one, max = 8
        let input = b"xxxxxxxxxxxxxxxxxxx\nsub 1\n";

        // Act
        let lines = read_all(input, 8).await;

        // Assert
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, LineRead::TooLong);
        assert_eq!(lines[1], (LineRead::Line, b"sub 1\n".to_vec()));
    }

    #[tokio::test]
    async fn test_line_of_exactly_max_bytes_is_accepted() {
        let lines = read_all(b"12345678\n", 8).await;
        assert_eq!(lines, vec![(LineRead::Line, b"12345678\n".to_vec())]);
    }

    #[tokio::test]
    async fn test_bind_reports_local_addr() {
        let server = RelayServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .expect("bind");

        let addr = server.local_addr().expect("local addr");

        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_to_port_in_use_fails() {
        let first = RelayServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .expect("bind");
        let addr = first.local_addr().unwrap();

        let second = RelayServer::bind(addr).await;

        assert!(matches!(second, Err(RelayError::BindFailed { .. })));
    }
}
