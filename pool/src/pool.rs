/// Pool collaborator interface
///
/// Share accounting, payouts and persistence live behind `MiningPool`.
/// The Stratum server only hands submissions over and asks for targets and
/// hash rates. `MemoryPool` is a self-contained implementation used by the
/// binary when no external pool is wired in, and by tests.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::hashrate::HashRate;
use crate::stratum::connection::Connection;
use crate::stratum::protocol::Randomness;

/// Pool-wide hash rate at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolHashRateSample {
    pub raw_hash_rate: f64,
    pub processed_hash_rate: String,
    pub timestamp_ms: i64,
}

impl PoolHashRateSample {
    pub fn new(raw: f64, timestamp_ms: i64) -> Self {
        Self {
            raw_hash_rate: raw,
            processed_hash_rate: HashRate(raw).to_string(),
            timestamp_ms,
        }
    }
}

/// Hash rate of one miner address at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHashRateSample {
    pub public_address: String,
    pub raw_hash_rate: f64,
    pub hash_rate: String,
    pub timestamp_ms: i64,
}

impl UserHashRateSample {
    pub fn new(public_address: String, raw: f64, timestamp_ms: i64) -> Self {
        Self {
            public_address,
            raw_hash_rate: raw,
            hash_rate: HashRate(raw).to_string(),
            timestamp_ms,
        }
    }
}

#[async_trait]
pub trait MiningPool: Send + Sync {
    /// Display name, used as the graffiti prefix
    fn name(&self) -> &str;

    /// Current share target sent with `mining.set_target`
    async fn get_target(&self) -> String;

    /// Verify and credit a submission. The server does not wait for this.
    async fn submit_work(&self, client: Arc<Connection>, mining_request_id: u64, randomness: Randomness);

    async fn estimate_hash_rate(&self) -> Result<f64>;

    async fn user_hash_rate(&self, address: &str) -> Result<f64>;

    async fn set_online_user(&self, address: &str, seen_at_ms: i64) -> Result<()>;

    async fn record_pool_hash_rate(&self, sample: PoolHashRateSample) -> Result<()>;

    async fn record_user_hash_rates(&self, samples: Vec<UserHashRateSample>) -> Result<()>;

    /// Called once when the server starts listening
    async fn set_all_users_offline(&self) -> Result<()> {
        Ok(())
    }

    /// Called once when the server starts listening
    async fn prune_history(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub client_id: u64,
    pub miner_address: Option<String>,
    pub mining_request_id: u64,
    pub randomness: Randomness,
}

/// Retained submissions and samples per kind
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

#[derive(Default)]
struct MemoryPoolState {
    shares: HashMap<String, VecDeque<Instant>>,
    submissions: VecDeque<Submission>,
    online: HashMap<String, i64>,
    pool_samples: VecDeque<PoolHashRateSample>,
    user_samples: VecDeque<Vec<UserHashRateSample>>,
}

fn push_capped<T>(queue: &mut VecDeque<T>, item: T, limit: usize) {
    queue.push_back(item);
    while queue.len() > limit {
        queue.pop_front();
    }
}

pub struct MemoryPool {
    name: String,
    target: RwLock<String>,
    /// Expected hashes behind one accepted share
    share_work: f64,
    window: Duration,
    history_limit: usize,
    state: RwLock<MemoryPoolState>,
}

impl MemoryPool {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: RwLock::new(target.into()),
            share_work: 1_000_000.0,
            window: Duration::from_secs(600),
            history_limit: DEFAULT_HISTORY_LIMIT,
            state: RwLock::new(MemoryPoolState::default()),
        }
    }

    pub fn with_share_work(mut self, share_work: f64, window: Duration) -> Self {
        self.share_work = share_work;
        self.window = window;
        self
    }

    /// Keep at most `limit` recent submissions and samples of each kind
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub async fn set_target(&self, target: impl Into<String>) {
        *self.target.write().await = target.into();
    }

    pub async fn submissions(&self) -> Vec<Submission> {
        self.state.read().await.submissions.iter().cloned().collect()
    }

    pub async fn online_users(&self) -> HashMap<String, i64> {
        self.state.read().await.online.clone()
    }

    pub async fn pool_samples(&self) -> Vec<PoolHashRateSample> {
        self.state.read().await.pool_samples.iter().cloned().collect()
    }

    pub async fn user_samples(&self) -> Vec<Vec<UserHashRateSample>> {
        self.state.read().await.user_samples.iter().cloned().collect()
    }

    fn rate_for(&self, shares: &VecDeque<Instant>, now: Instant) -> f64 {
        let recent = shares
            .iter()
            .filter(|t| now.duration_since(**t) <= self.window)
            .count();
        recent as f64 * self.share_work / self.window.as_secs_f64().max(1.0)
    }
}

#[async_trait]
impl MiningPool for MemoryPool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_target(&self) -> String {
        self.target.read().await.clone()
    }

    async fn submit_work(&self, client: Arc<Connection>, mining_request_id: u64, randomness: Randomness) {
        let miner_address = client.miner_address().map(str::to_string);
        tracing::debug!(
            "📥 Submission from client {} for request {} (randomness {})",
            client.id(),
            mining_request_id,
            randomness
        );

        let mut state = self.state.write().await;
        let now = Instant::now();
        if let Some(address) = &miner_address {
            state.shares.entry(address.clone()).or_default().push_back(now);
        }
        for shares in state.shares.values_mut() {
            while shares.front().is_some_and(|t| now.duration_since(*t) > self.window) {
                shares.pop_front();
            }
        }
        state.shares.retain(|_, shares| !shares.is_empty());

        let submission = Submission {
            client_id: client.id(),
            miner_address,
            mining_request_id,
            randomness,
        };
        push_capped(&mut state.submissions, submission, self.history_limit);
    }

    async fn estimate_hash_rate(&self) -> Result<f64> {
        let state = self.state.read().await;
        let now = Instant::now();
        Ok(state.shares.values().map(|s| self.rate_for(s, now)).sum())
    }

    async fn user_hash_rate(&self, address: &str) -> Result<f64> {
        let state = self.state.read().await;
        Ok(state
            .shares
            .get(address)
            .map(|s| self.rate_for(s, Instant::now()))
            .unwrap_or(0.0))
    }

    async fn set_online_user(&self, address: &str, seen_at_ms: i64) -> Result<()> {
        self.state.write().await.online.insert(address.to_string(), seen_at_ms);
        Ok(())
    }

    async fn record_pool_hash_rate(&self, sample: PoolHashRateSample) -> Result<()> {
        tracing::info!("📊 Pool hash rate: {}", sample.processed_hash_rate);
        push_capped(&mut self.state.write().await.pool_samples, sample, self.history_limit);
        Ok(())
    }

    async fn record_user_hash_rates(&self, samples: Vec<UserHashRateSample>) -> Result<()> {
        tracing::debug!("📊 Recorded hash rate for {} miners", samples.len());
        push_capped(&mut self.state.write().await.user_samples, samples, self.history_limit);
        Ok(())
    }

    async fn set_all_users_offline(&self) -> Result<()> {
        self.state.write().await.online.clear();
        Ok(())
    }

    async fn prune_history(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.pool_samples.clear();
        state.user_samples.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use tokio::sync::{mpsc, watch};

    fn subscribed(id: u64, address: &str) -> Arc<Connection> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5000);
        let (tx, _rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let conn = Connection::from_parts(id, addr, tx, shutdown_tx);
        conn.subscribe(address.to_string(), "test").unwrap();
        Arc::new(conn)
    }

    #[test]
    fn test_samples_carry_formatted_rate() {
        let sample = PoolHashRateSample::new(2_500_000.0, 1);
        assert_eq!(sample.processed_hash_rate, "2.50 MH/s");

        let user = UserHashRateSample::new("abc".into(), 1_000.0, 2);
        assert_eq!(user.hash_rate, "1.00 KH/s");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["publicAddress"], "abc");
        assert_eq!(json["rawHashRate"], 1_000.0);
    }

    #[tokio::test]
    async fn test_memory_pool_hash_rates() {
        let pool = MemoryPool::new("test", "ff").with_share_work(600.0, Duration::from_secs(60));

        pool.submit_work(subscribed(1, "a"), 1, Randomness::Number(1)).await;
        pool.submit_work(subscribed(1, "a"), 1, Randomness::Number(2)).await;
        pool.submit_work(subscribed(2, "b"), 1, Randomness::Number(3)).await;

        assert_eq!(pool.user_hash_rate("a").await.unwrap(), 20.0);
        assert_eq!(pool.user_hash_rate("b").await.unwrap(), 10.0);
        assert_eq!(pool.user_hash_rate("nobody").await.unwrap(), 0.0);
        assert_eq!(pool.estimate_hash_rate().await.unwrap(), 30.0);
        assert_eq!(pool.submissions().await.len(), 3);
    }

    #[tokio::test]
    async fn test_memory_pool_history_is_capped() {
        let pool = MemoryPool::new("test", "ff").with_history_limit(2);

        for id in 1..=5 {
            pool.submit_work(subscribed(1, "a"), id, Randomness::Number(id)).await;
            pool.record_pool_hash_rate(PoolHashRateSample::new(id as f64, id as i64)).await.unwrap();
            pool.record_user_hash_rates(vec![]).await.unwrap();
        }

        let ids: Vec<u64> = pool.submissions().await.iter().map(|s| s.mining_request_id).collect();
        assert_eq!(ids, vec![4, 5]);
        assert_eq!(pool.pool_samples().await.len(), 2);
        assert_eq!(pool.pool_samples().await[1].timestamp_ms, 5);
        assert_eq!(pool.user_samples().await.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_pool_forgets_stale_addresses() {
        let pool = MemoryPool::new("test", "ff").with_share_work(1.0, Duration::from_millis(20));
        pool.submit_work(subscribed(1, "a"), 1, Randomness::Number(1)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        pool.submit_work(subscribed(2, "b"), 1, Randomness::Number(2)).await;

        assert!(!pool.state.read().await.shares.contains_key("a"));
        assert!(pool.state.read().await.shares.contains_key("b"));
    }

    #[tokio::test]
    async fn test_memory_pool_online_tracking() {
        let pool = MemoryPool::new("test", "ff");
        pool.set_online_user("a", 10).await.unwrap();
        assert_eq!(pool.online_users().await.get("a"), Some(&10));

        pool.set_all_users_offline().await.unwrap();
        assert!(pool.online_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_memory_pool_target() {
        let pool = MemoryPool::new("test", "00ff");
        assert_eq!(pool.get_target().await, "00ff");
        pool.set_target("0fff").await;
        assert_eq!(pool.get_target().await, "0fff");
    }
}
