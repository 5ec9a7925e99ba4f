/// Stratum Server - async TCP mining server
///
/// Handles miner connections with:
/// - Async TCP (Tokio), one task per connection
/// - Strict per-line schema validation; any violation drops the connection
/// - Job broadcast to every registered, non-quarantined session
/// - Soft quarantine of bad clients (kept connected, starved of work)
/// - Fire-and-forget hand-off of submissions to the pool

use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, RwLock};

use super::codec::{self, FrameDecoder};
use super::connection::{Connection, Graffiti};
use super::error::{StratumError, StratumResult};
use super::protocol::{ClientMessage, ServerMessage, SetTargetBody, SubmitBody, SubscribeBody, SubscribedBody};
use super::registry::ConnectionRegistry;
use crate::address::{AddressValidator, PublicAddressValidator};
use crate::config::Config;
use crate::jobs::Job;
use crate::metrics::prometheus as metrics;
use crate::pool::MiningPool;
use crate::scheduler::{StatsIntervals, StatsScheduler};

const READ_CHUNK_BYTES: usize = 8 * 1024;

pub struct StratumServer {
    host: String,
    port: u16,
    pool: Arc<dyn MiningPool>,
    address_validator: Arc<dyn AddressValidator>,
    /// Lock order: `current_job` before `registry`
    registry: RwLock<ConnectionRegistry>,
    current_job: RwLock<Option<Job>>,
    next_client_id: AtomicU64,
    next_message_id: AtomicU64,
    idle_timeout: Option<Duration>,
    max_line_bytes: usize,
    stats_intervals: StatsIntervals,
    shutdown: watch::Sender<bool>,
}

impl StratumServer {
    /// Create new Stratum server
    pub fn new(config: &Config, pool: Arc<dyn MiningPool>) -> Result<Self> {
        Graffiti::check_pool_name(pool.name())
            .map_err(|e| anyhow!("pool name '{}' cannot produce graffiti: {}", pool.name(), e))?;

        tracing::info!("🌐 Creating Stratum server on {}:{}", config.host, config.port);

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            pool,
            address_validator: Arc::new(PublicAddressValidator),
            registry: RwLock::new(ConnectionRegistry::new()),
            current_job: RwLock::new(None),
            next_client_id: AtomicU64::new(1),
            next_message_id: AtomicU64::new(1),
            idle_timeout: config.idle_timeout(),
            max_line_bytes: config.max_line_bytes,
            stats_intervals: StatsIntervals::from_config(config),
            shutdown,
        })
    }

    pub fn with_address_validator(mut self, validator: Arc<dyn AddressValidator>) -> Self {
        self.address_validator = validator;
        self
    }

    pub fn pool(&self) -> &Arc<dyn MiningPool> {
        &self.pool
    }

    /// Bind the listening socket (SO_REUSEADDR)
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.host, self.port);
        let sock_addr: SocketAddr = addr
            .parse()
            .map_err(|e| anyhow!("Invalid address '{}': {}", addr, e))?;

        let socket = socket2::Socket::new(
            socket2::Domain::for_address(sock_addr),
            socket2::Type::STREAM,
            Some(socket2::Protocol::TCP),
        )?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&socket2::SockAddr::from(sock_addr))?;
        socket.listen(1024)?;
        let std_listener: std::net::TcpListener = socket.into();
        let listener = TcpListener::from_std(std_listener)?;

        tracing::info!("✅ Stratum server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Start Stratum server: bind, reset pool bookkeeping, spawn the stats
    /// scheduler and accept connections until `shutdown`.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        let listener = self.bind()?;

        if let Err(e) = self.pool.set_all_users_offline().await {
            tracing::warn!("⚠️ Failed to reset online users: {}", e);
        }
        if let Err(e) = self.pool.prune_history().await {
            tracing::warn!("⚠️ Failed to prune hash rate history: {}", e);
        }

        StatsScheduler::new(Arc::clone(&self), self.stats_intervals).spawn();

        self.serve(listener).await
    }

    /// Accept connections loop
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return Ok(());
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("🛑 Stratum server stopped accepting connections");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        let _ = socket.set_nodelay(true);
                        let server = Arc::clone(&self);
                        tokio::spawn(async move {
                            server.handle_connection(socket, peer_addr).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                    }
                },
            }
        }
    }

    /// Stop accepting, stop the scheduler and close every live connection.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let registry = self.registry.read().await;
        for connection in registry.connections() {
            connection.close(None);
        }
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Handle single miner connection
    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let (connection, mut reader) = Connection::accept(socket, peer_addr, id);

        {
            let mut registry = self.registry.write().await;
            registry.register(Arc::clone(&connection));
        }
        metrics::inc_connections();

        tracing::debug!("🔌 Client {} connected: {}", id, peer_addr);

        match self.read_loop(&connection, &mut reader).await {
            Ok(()) => self.on_disconnect(&connection).await,
            Err(e) => self.on_error(&connection, e).await,
        }
    }

    async fn read_loop(&self, connection: &Arc<Connection>, reader: &mut OwnedReadHalf) -> StratumResult<()> {
        let mut decoder = FrameDecoder::new(connection.id(), self.max_line_bytes);
        let mut closed = connection.closed();
        if *closed.borrow_and_update() {
            return Ok(());
        }

        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        loop {
            let n = tokio::select! {
                _ = closed.changed() => return Ok(()),
                read = self.read_chunk(connection.id(), reader, &mut buf) => read?,
            };
            if n == 0 {
                return Ok(());
            }

            // A failure on one line drops every later line of the chunk.
            decoder.extend(&buf[..n]);
            while let Some(line) = decoder.next_line() {
                let line = line?;
                if !connection.is_connected() {
                    return Ok(());
                }
                let message = codec::decode_line(connection.id(), &line, self.address_validator.as_ref())?;
                self.dispatch(connection, message).await?;
            }
            decoder.check_pending()?;
        }
    }

    async fn read_chunk(&self, client_id: u64, reader: &mut OwnedReadHalf, buf: &mut [u8]) -> StratumResult<usize> {
        match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, reader.read(buf))
                .await
                .map_err(|_| StratumError::IdleTimeout { client_id })?
                .map_err(StratumError::from),
            None => Ok(reader.read(buf).await?),
        }
    }

    /// Handle one validated message
    pub(crate) async fn dispatch(&self, connection: &Arc<Connection>, message: ClientMessage) -> StratumResult<()> {
        tracing::debug!("📨 Client {} sent {} message", connection.id(), message.method());

        match message {
            ClientMessage::Subscribe { body, .. } => self.handle_subscribe(connection, body).await,
            ClientMessage::Submit { body, .. } => self.handle_submit(connection, body),
        }
    }

    /// Handle subscribe: record identity, answer with subscribed + set_target,
    /// and catch the miner up on the current job.
    async fn handle_subscribe(&self, connection: &Arc<Connection>, body: SubscribeBody) -> StratumResult<()> {
        let target = self.pool.get_target().await;
        let subscription = connection.subscribe(body.public_address, self.pool.name())?;

        metrics::inc_subscriptions();
        metrics::inc_miner_connections(&subscription.miner_address);

        // Both guards are held until the replies are queued: the job lock
        // keeps a new_work notify from overtaking mining.subscribed, the
        // registry lock keeps quarantine from landing between the check and
        // the catch-up notify.
        let job = self.current_job.read().await;
        let registry = self.registry.read().await;
        let total = registry.len();
        let quarantined = registry.is_quarantined(connection.id());

        tracing::info!(
            "⛏️ Miner {:x} subscribed from {} as {} ({} total)",
            connection.id(),
            connection.peer_addr(),
            subscription.miner_address,
            total
        );

        self.send(
            connection,
            ServerMessage::Subscribed(SubscribedBody {
                client_id: connection.id(),
                graffiti: subscription.graffiti_label.clone(),
            }),
        )?;
        self.send(connection, ServerMessage::SetTarget(SetTargetBody { target }))?;

        if let Some(job) = job.as_ref() {
            if !quarantined {
                self.send(connection, ServerMessage::Notify(job.notify_body()))?;
            }
        }
        drop(registry);

        Ok(())
    }

    /// Handle submit: hand the share to the pool without waiting on it
    fn handle_submit(&self, connection: &Arc<Connection>, body: SubmitBody) -> StratumResult<()> {
        if !connection.is_subscribed() {
            return Err(StratumError::malformed(
                connection.id(),
                Some("mining.submit"),
                "submit before subscribe",
            ));
        }

        metrics::inc_submissions();

        let pool = Arc::clone(&self.pool);
        let client = Arc::clone(connection);
        tokio::spawn(async move {
            pool.submit_work(client, body.mining_request_id, body.randomness).await;
        });

        Ok(())
    }

    /// Invariant violations end the process regardless of panic strategy.
    fn on_fatal(&self, error: &StratumError) -> ! {
        tracing::error!("💥 Stratum server cannot continue: {}", error);
        std::process::abort();
    }

    async fn on_error(&self, connection: &Arc<Connection>, error: StratumError) {
        if !error.is_connection_fatal() {
            self.on_fatal(&error);
        }
        if matches!(error, StratumError::Malformed { .. }) {
            metrics::inc_malformed_messages();
        }

        tracing::debug!(
            "Error during handling of data from client {} ({}): {}",
            connection.id(),
            connection.peer_addr(),
            error
        );

        connection.close(Some(&error));
        self.remove(connection).await;
    }

    async fn on_disconnect(&self, connection: &Arc<Connection>) {
        let remaining = self.remove(connection).await;
        connection.close(None);
        tracing::debug!("🔌 Client {} disconnected ({} total)", connection.id(), remaining);
    }

    async fn remove(&self, connection: &Arc<Connection>) -> usize {
        let (removed, remaining) = {
            let mut registry = self.registry.write().await;
            let removed = registry.unregister(connection.id()).is_some();
            metrics::set_quarantined_clients(registry.quarantined_count());
            (removed, registry.len())
        };

        if removed {
            metrics::dec_connections();
            if let Some(address) = connection.miner_address() {
                metrics::dec_miner_connections(address);
            }
        }
        remaining
    }

    /// Assign the next sequence id and serialize
    fn encode(&self, message: &ServerMessage) -> StratumResult<(u64, String)> {
        let sequence_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let frame = message
            .encode(sequence_id)
            .map_err(|e| StratumError::Invariant(format!("failed to encode {}: {}", message.method(), e)))?;
        Ok((sequence_id, frame))
    }

    /// Unicast to one session
    fn send(&self, connection: &Connection, message: ServerMessage) -> StratumResult<()> {
        let (_, frame) = self.encode(&message)?;
        if connection.send_frame(frame) {
            metrics::inc_messages_sent(message.method().as_str(), 1);
        }
        Ok(())
    }

    /// Send to every registered, connected, non-quarantined session.
    async fn broadcast(&self, message: &ServerMessage) -> StratumResult<usize> {
        let (sequence_id, frame) = self.encode(message)?;
        let registry = self.registry.read().await;

        let sent = registry
            .broadcast_targets()
            .filter(|connection| connection.send_frame(frame.clone()))
            .count();

        tracing::debug!(
            "📢 Broadcast {} #{} to {} of {} clients",
            message.method(),
            sequence_id,
            sent,
            registry.len()
        );

        metrics::inc_messages_sent(message.method().as_str(), sent as u64);
        Ok(sent)
    }

    /// Replace the current job and notify every eligible miner.
    ///
    /// Returns how many sessions the notify was queued for.
    pub async fn new_work(&self, mining_request_id: u64, header: Vec<u8>) -> StratumResult<usize> {
        let job = Job::new(mining_request_id, header);
        let message = ServerMessage::Notify(job.notify_body());

        let mut current = self.current_job.write().await;
        if let Some(previous) = current.as_ref() {
            if previous.mining_request_id >= mining_request_id {
                tracing::warn!(
                    "⚠️ Mining request id went from {} to {}",
                    previous.mining_request_id,
                    mining_request_id
                );
            }
        }

        let preview = job.header_hex();
        tracing::info!(
            "Setting work for request: {} {}...",
            mining_request_id,
            &preview[..preview.len().min(50)]
        );

        *current = Some(job);
        metrics::set_current_request_id(mining_request_id);

        let sent = self.broadcast(&message).await?;
        drop(current);

        metrics::inc_job_broadcasts();
        tracing::info!("📢 Broadcasted job {} to {} miners", mining_request_id, sent);
        Ok(sent)
    }

    /// Tell every eligible miner to stop hashing
    pub async fn wait_for_work(&self) -> StratumResult<usize> {
        self.broadcast(&ServerMessage::WaitForWork).await
    }

    pub async fn has_work(&self) -> bool {
        self.current_job.read().await.is_some()
    }

    pub async fn current_job(&self) -> Option<Job> {
        self.current_job.read().await.clone()
    }

    /// Exclude a client from broadcasts without disconnecting it.
    ///
    /// Sends it one `mining.wait_for_work`. Returns false when the client is
    /// unknown or already quarantined.
    pub async fn quarantine(&self, client_id: u64) -> StratumResult<bool> {
        let mut registry = self.registry.write().await;
        let Some(connection) = registry.quarantine(client_id) else {
            return Ok(false);
        };
        metrics::set_quarantined_clients(registry.quarantined_count());

        tracing::warn!("🚫 Client {} ({}) marked as bad client", client_id, connection.peer_addr());
        self.send(&connection, ServerMessage::WaitForWork)?;
        Ok(true)
    }

    pub async fn is_quarantined(&self, client_id: u64) -> bool {
        self.registry.read().await.is_quarantined(client_id)
    }

    /// Connected clients excluding quarantined ones
    pub async fn client_count(&self) -> usize {
        self.registry.read().await.live_count()
    }

    /// Every registered connection, quarantined ones included
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn connection(&self, client_id: u64) -> Option<Arc<Connection>> {
        self.registry.read().await.get(client_id).cloned()
    }

    /// Distinct addresses of subscribed miners
    pub async fn miner_addresses(&self) -> Vec<String> {
        self.registry.read().await.miner_addresses()
    }

    /// Hash rate for `address`, if some connected miner claims it
    pub async fn hash_rate_for(&self, address: &str) -> Result<Option<f64>> {
        let known = self.registry.read().await.has_miner_address(address);
        if !known {
            return Ok(None);
        }
        Ok(Some(self.pool.user_hash_rate(address).await?))
    }

    #[cfg(test)]
    pub(crate) async fn register_for_test(&self, connection: Arc<Connection>) {
        self.registry.write().await.register(connection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::MemoryPool;
    use crate::stratum::protocol::Randomness;
    use serde_json::Value;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::sync::mpsc;

    fn server() -> (StratumServer, Arc<MemoryPool>) {
        let config = Config { host: "127.0.0.1".to_string(), port: 0, ..Config::default() };
        let pool = Arc::new(MemoryPool::new("ferrous", "00ff"));
        let server = StratumServer::new(&config, pool.clone()).unwrap();
        (server, pool)
    }

    fn detached(id: u64) -> (Arc<Connection>, mpsc::UnboundedReceiver<String>) {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7000);
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        (Arc::new(Connection::from_parts(id, addr, tx, shutdown_tx)), rx)
    }

    fn frames(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(serde_json::from_str(frame.trim_end()).unwrap());
        }
        out
    }

    fn subscribe_msg() -> ClientMessage {
        ClientMessage::Subscribe {
            id: 1,
            body: SubscribeBody { public_address: "ab".repeat(32) },
        }
    }

    #[test]
    fn test_rejects_pool_name_without_room_for_graffiti() {
        let pool = Arc::new(MemoryPool::new("a-pool-name-that-is-too-long", "00"));
        assert!(StratumServer::new(&Config::default(), pool).is_err());
    }

    #[tokio::test]
    async fn test_server_creation() {
        let (server, _) = server();
        assert_eq!(server.connection_count().await, 0);
        assert_eq!(server.client_count().await, 0);
        assert!(!server.has_work().await);
    }

    #[tokio::test]
    async fn test_subscribe_response_sequence() {
        let (server, _) = server();
        let (conn, mut rx) = detached(26);
        server.register_for_test(conn.clone()).await;

        server.dispatch(&conn, subscribe_msg()).await.unwrap();

        let out = frames(&mut rx);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["method"], "mining.subscribed");
        assert_eq!(out[0]["body"]["clientId"], 26);
        assert_eq!(out[0]["body"]["graffiti"], "ferrous.1a");
        assert_eq!(out[1]["method"], "mining.set_target");
        assert_eq!(out[1]["body"]["target"], "00ff");
        assert!(out[1]["id"].as_u64().unwrap() > out[0]["id"].as_u64().unwrap());
        assert!(conn.is_subscribed());
    }

    #[tokio::test]
    async fn test_late_subscribe_receives_current_job() {
        let (server, _) = server();
        server.new_work(3, vec![1, 2, 3]).await.unwrap();

        let (conn, mut rx) = detached(1);
        server.register_for_test(conn.clone()).await;
        server.dispatch(&conn, subscribe_msg()).await.unwrap();

        let out = frames(&mut rx);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2]["method"], "mining.notify");
        assert_eq!(out[2]["body"]["miningRequestId"], 3);
        assert_eq!(out[2]["body"]["header"], "010203");
    }

    #[tokio::test]
    async fn test_new_work_skips_quarantined() {
        let (server, _) = server();
        let (a, mut rx_a) = detached(1);
        let (b, mut rx_b) = detached(2);
        server.register_for_test(a).await;
        server.register_for_test(b).await;

        assert!(server.quarantine(2).await.unwrap());
        assert!(!server.quarantine(2).await.unwrap());
        assert_eq!(server.client_count().await, 1);
        assert_eq!(server.connection_count().await, 2);

        let sent = server.new_work(7, vec![0xaa]).await.unwrap();
        assert_eq!(sent, 1);

        let out_a = frames(&mut rx_a);
        assert_eq!(out_a.len(), 1);
        assert_eq!(out_a[0]["method"], "mining.notify");

        let out_b = frames(&mut rx_b);
        assert_eq!(out_b.len(), 1);
        assert_eq!(out_b[0]["method"], "mining.wait_for_work");
        assert!(out_b[0].get("body").is_none());
    }

    #[tokio::test]
    async fn test_new_work_with_no_clients() {
        let (server, _) = server();
        assert_eq!(server.new_work(1, vec![0]).await.unwrap(), 0);
        assert!(server.has_work().await);
        assert_eq!(server.current_job().await, Some(Job::new(1, vec![0])));
    }

    #[tokio::test]
    async fn test_sequence_ids_shared_by_unicast_and_broadcast() {
        let (server, _) = server();
        let (conn, mut rx) = detached(1);
        server.register_for_test(conn.clone()).await;

        server.dispatch(&conn, subscribe_msg()).await.unwrap();
        server.new_work(1, vec![0]).await.unwrap();
        server.wait_for_work().await.unwrap();

        let ids: Vec<u64> = frames(&mut rx).iter().map(|f| f["id"].as_u64().unwrap()).collect();
        assert_eq!(ids.len(), 4);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_submit_before_subscribe_is_malformed() {
        let (server, pool) = server();
        let (conn, _rx) = detached(1);
        let submit = ClientMessage::Submit {
            id: 2,
            body: SubmitBody { mining_request_id: 1, randomness: Randomness::Number(5) },
        };

        let err = server.dispatch(&conn, submit).await.unwrap_err();
        assert!(matches!(err, StratumError::Malformed { client_id: 1, .. }));
        assert!(pool.submissions().await.is_empty());
    }

    #[tokio::test]
    async fn test_submit_is_handed_to_pool() {
        let (server, pool) = server();
        let (conn, _rx) = detached(4);
        server.dispatch(&conn, subscribe_msg()).await.unwrap();

        let submit = ClientMessage::Submit {
            id: 2,
            body: SubmitBody { mining_request_id: 9, randomness: Randomness::Hex("beef".into()) },
        };
        server.dispatch(&conn, submit).await.unwrap();

        let mut submissions = Vec::new();
        for _ in 0..50 {
            submissions = pool.submissions().await;
            if !submissions.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].client_id, 4);
        assert_eq!(submissions[0].mining_request_id, 9);
    }

    #[tokio::test]
    async fn test_quarantined_subscribe_gets_no_job() {
        let (server, _) = server();
        server.new_work(1, vec![0]).await.unwrap();
        let (conn, mut rx) = detached(1);
        server.register_for_test(conn.clone()).await;
        server.quarantine(1).await.unwrap();
        frames(&mut rx);

        server.dispatch(&conn, subscribe_msg()).await.unwrap();
        let methods: Vec<String> = frames(&mut rx)
            .iter()
            .map(|f| f["method"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(methods, vec!["mining.subscribed", "mining.set_target"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_notify_after_wait_for_work_when_quarantine_races_subscribe() {
        for _ in 0..200 {
            let (server, _) = server();
            let server = Arc::new(server);
            server.new_work(1, vec![0x11]).await.unwrap();

            let (conn, mut rx) = detached(1);
            server.register_for_test(conn.clone()).await;

            let subscriber = {
                let server = server.clone();
                let conn = conn.clone();
                tokio::spawn(async move { server.dispatch(&conn, subscribe_msg()).await })
            };
            let quarantiner = {
                let server = server.clone();
                tokio::spawn(async move { server.quarantine(1).await })
            };
            subscriber.await.unwrap().unwrap();
            assert!(quarantiner.await.unwrap().unwrap());

            let methods: Vec<String> = frames(&mut rx)
                .iter()
                .map(|f| f["method"].as_str().unwrap().to_string())
                .collect();
            let stop = methods.iter().position(|m| m == "mining.wait_for_work").unwrap();
            assert!(
                !methods[stop..].iter().any(|m| m == "mining.notify"),
                "notify after wait_for_work: {:?}",
                methods
            );
        }
    }

    #[tokio::test]
    async fn test_hash_rate_for_registered_address_only() {
        let (server, _) = server();
        let (conn, _rx) = detached(1);
        server.register_for_test(conn.clone()).await;
        server.dispatch(&conn, subscribe_msg()).await.unwrap();

        assert_eq!(server.hash_rate_for(&"ab".repeat(32)).await.unwrap(), Some(0.0));
        assert_eq!(server.hash_rate_for("unknown").await.unwrap(), None);
        assert_eq!(server.miner_addresses().await, vec!["ab".repeat(32)]);
    }
}
