/// Connection state for a single Stratum miner
///
/// Tracks:
/// - Identity (process-unique id, peer address)
/// - Subscription (miner address + graffiti, set exactly once)
/// - Transport ownership (outbound writer task, teardown signal)

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

use super::error::{GraffitiError, StratumError, StratumResult};

/// Fixed size of the graffiti field embedded in mined blocks
pub const GRAFFITI_SIZE: usize = 32;

/// Zero-padded graffiti bytes attributing a block to one session
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Graffiti([u8; GRAFFITI_SIZE]);

impl Graffiti {
    /// Human-readable graffiti for a session: `<pool>.<hex id>`
    pub fn label(pool_name: &str, client_id: u64) -> String {
        format!("{}.{:x}", pool_name, client_id)
    }

    pub fn from_label(label: &str) -> Result<Self, GraffitiError> {
        let raw = label.as_bytes();
        if raw.len() > GRAFFITI_SIZE {
            return Err(GraffitiError::TooLong {
                label: label.to_string(),
                len: raw.len(),
                max: GRAFFITI_SIZE,
            });
        }
        let mut bytes = [0u8; GRAFFITI_SIZE];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self(bytes))
    }

    /// Check that every id this process can assign yields a valid graffiti.
    pub fn check_pool_name(pool_name: &str) -> Result<(), GraffitiError> {
        Self::from_label(&Self::label(pool_name, u64::MAX)).map(|_| ())
    }

    pub fn as_bytes(&self) -> &[u8; GRAFFITI_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Graffiti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Graffiti({})", hex::encode(self.0))
    }
}

/// Identity a miner claimed during `mining.subscribe`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub miner_address: String,
    pub graffiti: Graffiti,
    pub graffiti_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, no valid subscribe yet
    Connected,
    /// After a successful subscribe
    Subscribed,
    /// Teardown has begun
    Closed,
}

pub struct Connection {
    /// Process-unique id, never reused
    id: u64,

    /// Peer address
    peer_addr: SocketAddr,

    connected_at: Instant,

    /// Cleared once teardown starts
    connected: AtomicBool,

    subscription: OnceLock<Subscription>,

    /// Outbound writer channel (server -> miner)
    outbound: mpsc::UnboundedSender<String>,

    /// Flipped to `true` by `close`; observed by the reader and writer tasks
    shutdown: watch::Sender<bool>,
}

impl Connection {
    /// Take ownership of an accepted socket.
    ///
    /// Spawns the writer task that owns the write half and hands the read
    /// half back to the caller's read loop.
    pub fn accept(stream: TcpStream, peer_addr: SocketAddr, id: u64) -> (Arc<Self>, OwnedReadHalf) {
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(write_loop(writer, rx, shutdown_rx));

        (Arc::new(Self::from_parts(id, peer_addr, tx, shutdown_tx)), reader)
    }

    pub(crate) fn from_parts(
        id: u64,
        peer_addr: SocketAddr,
        outbound: mpsc::UnboundedSender<String>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            id,
            peer_addr,
            connected_at: Instant::now(),
            connected: AtomicBool::new(true),
            subscription: OnceLock::new(),
            outbound,
            shutdown,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.get().is_some()
    }

    pub fn state(&self) -> ConnectionState {
        if !self.is_connected() {
            ConnectionState::Closed
        } else if self.is_subscribed() {
            ConnectionState::Subscribed
        } else {
            ConnectionState::Connected
        }
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.get()
    }

    pub fn miner_address(&self) -> Option<&str> {
        self.subscription.get().map(|s| s.miner_address.as_str())
    }

    pub fn graffiti(&self) -> Option<&Graffiti> {
        self.subscription.get().map(|s| &s.graffiti)
    }

    /// Get connection uptime
    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Record the miner's identity. Allowed exactly once per connection.
    ///
    /// A graffiti that does not fit is an `Invariant` error: pool names are
    /// checked at server construction, so it can only happen through a bug.
    pub fn subscribe(&self, miner_address: String, pool_name: &str) -> StratumResult<&Subscription> {
        let graffiti_label = Graffiti::label(pool_name, self.id);
        let graffiti = Graffiti::from_label(&graffiti_label)
            .map_err(|e| StratumError::Invariant(e.to_string()))?;

        self.subscription
            .set(Subscription { miner_address, graffiti, graffiti_label })
            .map_err(|_| {
                StratumError::malformed(self.id, Some("mining.subscribe"), "already subscribed")
            })?;

        self.subscription
            .get()
            .ok_or_else(|| StratumError::Invariant("subscription vanished after set".into()))
    }

    /// Receiver that resolves once `close` has been called
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Queue an encoded frame for the writer task. Returns false once closed.
    pub(crate) fn send_frame(&self, frame: String) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.outbound.send(frame).is_ok()
    }

    /// Tear down the transport. Only the first call has any effect.
    pub fn close(&self, reason: Option<&StratumError>) -> bool {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return false;
        }

        match reason {
            Some(e) => tracing::debug!("🔌 Closing client {} ({}): {}", self.id, self.peer_addr, e),
            None => tracing::debug!("🔌 Closing client {} ({})", self.id, self.peer_addr),
        }

        self.shutdown.send_replace(true);
        true
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .field("miner_address", &self.miner_address())
            .finish()
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            msg = rx.recv() => match msg {
                Some(frame) => {
                    if writer.write_all(frame.as_bytes()).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
    let _ = writer.shutdown().await;
}
