use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::stratum::codec::DEFAULT_MAX_LINE_BYTES;
use crate::stratum::connection::Graffiti;

const DEFAULT_CONFIG_FILE: &str = "pool_config.json";

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Display name, also the graffiti prefix
    pub pool_name: String,
    pub metrics_listen: String,
    pub pool_hashrate_secs: u64,
    pub user_hashrate_secs: u64,
    pub online_sweep_secs: u64,
    /// 0 disables the idle timeout
    pub idle_timeout_secs: u64,
    pub max_line_bytes: usize,
    /// Share target reported by the built-in pool
    pub target: String,
    /// 0 disables synthetic jobs
    pub demo_work_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9034,
            pool_name: "ferrous".to_string(),
            metrics_listen: "0.0.0.0:9100".to_string(),
            pool_hashrate_secs: 1800,
            user_hashrate_secs: 1800,
            online_sweep_secs: 5,
            idle_timeout_secs: 0,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            target: "f".repeat(64),
            demo_work_secs: 0,
        }
    }
}

impl Config {
    /// Defaults, then environment overrides, then `pool_config.json` (or
    /// `$POOL_CONFIG`) replacing everything when present.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(h) = std::env::var("POOL_HOST") { cfg.host = h; }
        if let Ok(p) = std::env::var("POOL_PORT") {
            cfg.port = p.parse().with_context(|| format!("POOL_PORT '{}'", p))?;
        }
        if let Ok(n) = std::env::var("POOL_NAME") { cfg.pool_name = n; }
        if let Ok(m) = std::env::var("POOL_METRICS_LISTEN") { cfg.metrics_listen = m; }
        if let Ok(s) = std::env::var("POOL_HASHRATE_SECS") { cfg.pool_hashrate_secs = s.parse().unwrap_or(1800); }
        if let Ok(s) = std::env::var("POOL_USER_HASHRATE_SECS") { cfg.user_hashrate_secs = s.parse().unwrap_or(1800); }
        if let Ok(s) = std::env::var("POOL_ONLINE_SWEEP_SECS") { cfg.online_sweep_secs = s.parse().unwrap_or(5); }
        if let Ok(s) = std::env::var("POOL_IDLE_TIMEOUT") { cfg.idle_timeout_secs = s.parse().unwrap_or(0); }
        if let Ok(t) = std::env::var("POOL_TARGET") { cfg.target = t; }
        if let Ok(s) = std::env::var("POOL_DEMO_WORK_SECS") { cfg.demo_work_secs = s.parse().unwrap_or(0); }

        let path = std::env::var("POOL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        if let Ok(txt) = std::fs::read_to_string(&path) {
            match serde_json::from_str::<Config>(&txt) {
                Ok(file_cfg) => {
                    tracing::info!("✅ Loaded pool config from {}", path);
                    cfg = file_cfg;
                }
                Err(e) => tracing::warn!("⚠️ Failed to parse pool config {}: {}", path, e),
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_name.is_empty() {
            bail!("pool name must not be empty");
        }
        Graffiti::check_pool_name(&self.pool_name)
            .map_err(|e| anyhow!("pool name '{}' is too long: {}", self.pool_name, e))?;
        if self.pool_hashrate_secs == 0 || self.user_hashrate_secs == 0 || self.online_sweep_secs == 0 {
            bail!("scheduler intervals must be greater than zero");
        }
        if self.max_line_bytes == 0 {
            bail!("max_line_bytes must be greater than zero");
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow!("Invalid address '{}': {}", addr, e))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn demo_work_interval(&self) -> Option<Duration> {
        (self.demo_work_secs > 0).then(|| Duration::from_secs(self.demo_work_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.listen_addr().unwrap().port(), 9034);
        assert!(cfg.idle_timeout().is_none());
        assert!(cfg.demo_work_interval().is_none());
    }

    #[test]
    fn test_rejects_long_pool_name() {
        let cfg = Config { pool_name: "a-very-long-pool-name".to_string(), ..Config::default() };
        assert!(cfg.validate().is_err());

        let cfg = Config { pool_name: String::new(), ..Config::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_interval_and_bad_host() {
        let cfg = Config { online_sweep_secs: 0, ..Config::default() };
        assert!(cfg.validate().is_err());

        let cfg = Config { host: "not a host".to_string(), ..Config::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"port": 3333, "pool_name": "iron"}"#).unwrap();
        assert_eq!(cfg.port, 3333);
        assert_eq!(cfg.pool_name, "iron");
        assert_eq!(cfg.online_sweep_secs, 5);
        assert_eq!(cfg.idle_timeout(), None);
    }
}
