/// Periodic statistics tasks
///
/// Three independent loops run while the server is up:
/// - pool hash rate sample (default every 30 min)
/// - per-address hash rate samples (default every 30 min)
/// - online sweep marking every connected address as seen (default every 5 s)
///
/// A failing tick is logged and retried on the next one.

use anyhow::Result;
use chrono::Utc;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::Config;
use crate::metrics::prometheus as metrics;
use crate::pool::{PoolHashRateSample, UserHashRateSample};
use crate::stratum::StratumServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsIntervals {
    pub pool_hash_rate: Duration,
    pub user_hash_rate: Duration,
    pub online_sweep: Duration,
}

impl StatsIntervals {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pool_hash_rate: Duration::from_secs(config.pool_hashrate_secs),
            user_hash_rate: Duration::from_secs(config.user_hashrate_secs),
            online_sweep: Duration::from_secs(config.online_sweep_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatsTask {
    PoolHashRate,
    UserHashRates,
    OnlineSweep,
}

impl StatsTask {
    fn name(self) -> &'static str {
        match self {
            Self::PoolHashRate => "pool hash rate",
            Self::UserHashRates => "user hash rates",
            Self::OnlineSweep => "online sweep",
        }
    }
}

pub struct StatsScheduler {
    server: Weak<StratumServer>,
    intervals: StatsIntervals,
}

impl StatsScheduler {
    pub fn new(server: Arc<StratumServer>, intervals: StatsIntervals) -> Self {
        Self { server: Arc::downgrade(&server), intervals }
    }

    /// Spawn one loop per task. Each stops on server shutdown or drop.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let scheduler = Arc::new(self);
        [
            (StatsTask::PoolHashRate, scheduler.intervals.pool_hash_rate),
            (StatsTask::UserHashRates, scheduler.intervals.user_hash_rate),
            (StatsTask::OnlineSweep, scheduler.intervals.online_sweep),
        ]
        .into_iter()
        .map(|(task, period)| {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run(task, period).await })
        })
        .collect()
    }

    async fn run(&self, task: StatsTask, period: Duration) {
        let Some(mut shutdown) = self.server.upgrade().map(|s| s.shutdown_signal()) else {
            return;
        };

        // First tick after one full period, not immediately.
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("⏱️ Stats task '{}' started (every {:?})", task.name(), period);

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let Some(server) = self.server.upgrade() else { break };
                    if let Err(e) = Self::run_once(&server, task).await {
                        tracing::warn!("⚠️ Stats task '{}' failed: {}", task.name(), e);
                    }
                }
            }
        }

        tracing::debug!("Stats task '{}' stopped", task.name());
    }

    async fn run_once(server: &StratumServer, task: StatsTask) -> Result<()> {
        match task {
            StatsTask::PoolHashRate => report_pool_hash_rate(server).await.map(|_| ()),
            StatsTask::UserHashRates => report_user_hash_rates(server).await.map(|_| ()),
            StatsTask::OnlineSweep => sweep_online_users(server).await.map(|_| ()),
        }
    }
}

/// Ask the pool for its estimate and record it as a formatted sample.
pub async fn report_pool_hash_rate(server: &StratumServer) -> Result<PoolHashRateSample> {
    let raw = server.pool().estimate_hash_rate().await?;
    let sample = PoolHashRateSample::new(raw, Utc::now().timestamp_millis());
    server.pool().record_pool_hash_rate(sample.clone()).await?;
    Ok(sample)
}

/// One sample per distinct connected address, forwarded in a single batch.
///
/// Addresses whose lookup fails are skipped for this tick.
pub async fn report_user_hash_rates(server: &StratumServer) -> Result<Vec<UserHashRateSample>> {
    let timestamp_ms = Utc::now().timestamp_millis();
    let mut samples = Vec::new();

    for address in server.miner_addresses().await {
        match server.pool().user_hash_rate(&address).await {
            Ok(raw) => {
                metrics::set_miner_hashrate(&address, raw);
                samples.push(UserHashRateSample::new(address, raw, timestamp_ms));
            }
            Err(e) => tracing::warn!("⚠️ Hash rate lookup for {} failed: {}", address, e),
        }
    }

    if !samples.is_empty() {
        server.pool().record_user_hash_rates(samples.clone()).await?;
    }
    Ok(samples)
}

/// Mark every connected address as online. Returns how many were marked.
pub async fn sweep_online_users(server: &StratumServer) -> Result<usize> {
    let seen_at = Utc::now().timestamp_millis();
    let mut marked = 0;

    for address in server.miner_addresses().await {
        match server.pool().set_online_user(&address, seen_at).await {
            Ok(()) => marked += 1,
            Err(e) => tracing::warn!("⚠️ Failed to mark {} online: {}", address, e),
        }
    }
    Ok(marked)
}
