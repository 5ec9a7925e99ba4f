pub mod address;
pub mod config;
pub mod hashrate;
pub mod jobs;
pub mod metrics;
pub mod pool;
pub mod scheduler;
pub mod stratum;
