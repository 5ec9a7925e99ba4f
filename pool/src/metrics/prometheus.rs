use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, TextEncoder};
use std::sync::OnceLock;

static SUBSCRIPTIONS: OnceLock<IntCounter> = OnceLock::new();
static MALFORMED_MESSAGES: OnceLock<IntCounter> = OnceLock::new();
static SUBMISSIONS: OnceLock<IntCounter> = OnceLock::new();
static JOB_BROADCASTS: OnceLock<IntCounter> = OnceLock::new();
static MESSAGES_SENT: OnceLock<IntCounterVec> = OnceLock::new();

static ACTIVE_CONNECTIONS: OnceLock<IntGauge> = OnceLock::new();
static QUARANTINED_CLIENTS: OnceLock<IntGauge> = OnceLock::new();
static CURRENT_REQUEST_ID: OnceLock<IntGauge> = OnceLock::new();

// ── Per-miner labeled metrics ──────────────────────────────────────
static MINER_HASHRATE: OnceLock<IntGaugeVec> = OnceLock::new();
static MINER_CONNECTIONS: OnceLock<IntGaugeVec> = OnceLock::new();

fn subscriptions() -> &'static IntCounter {
    SUBSCRIPTIONS.get_or_init(|| {
        IntCounter::new("stratum_subscriptions_total", "Total successful mining.subscribe handshakes")
            .expect("valid metric")
    })
}

fn malformed_messages() -> &'static IntCounter {
    MALFORMED_MESSAGES.get_or_init(|| {
        IntCounter::new(
            "stratum_malformed_messages_total",
            "Total connections closed for malformed client messages",
        )
        .expect("valid metric")
    })
}

fn submissions() -> &'static IntCounter {
    SUBMISSIONS.get_or_init(|| {
        IntCounter::new("stratum_submissions_total", "Total mining.submit messages handed to the pool")
            .expect("valid metric")
    })
}

fn job_broadcasts() -> &'static IntCounter {
    JOB_BROADCASTS.get_or_init(|| {
        IntCounter::new("job_broadcasts_total", "Total mining.notify broadcasts sent")
            .expect("valid metric")
    })
}

fn messages_sent() -> &'static IntCounterVec {
    MESSAGES_SENT.get_or_init(|| {
        IntCounterVec::new(
            Opts::new("stratum_messages_sent_total", "Outbound frames queued per method"),
            &["method"],
        )
        .expect("valid metric")
    })
}

fn active_connections() -> &'static IntGauge {
    ACTIVE_CONNECTIONS.get_or_init(|| {
        IntGauge::new("stratum_active_connections", "Currently registered connections")
            .expect("valid metric")
    })
}

fn quarantined_clients() -> &'static IntGauge {
    QUARANTINED_CLIENTS.get_or_init(|| {
        IntGauge::new("stratum_quarantined_clients", "Connected clients excluded from broadcasts")
            .expect("valid metric")
    })
}

fn current_request_id() -> &'static IntGauge {
    CURRENT_REQUEST_ID.get_or_init(|| {
        IntGauge::new("stratum_current_mining_request_id", "Request id of the current job")
            .expect("valid metric")
    })
}

fn miner_hashrate() -> &'static IntGaugeVec {
    MINER_HASHRATE.get_or_init(|| {
        IntGaugeVec::new(
            Opts::new("miner_hashrate", "Estimated hash rate per miner address (H/s)"),
            &["address"],
        )
        .expect("valid metric")
    })
}

fn miner_connections() -> &'static IntGaugeVec {
    MINER_CONNECTIONS.get_or_init(|| {
        IntGaugeVec::new(
            Opts::new("miner_connections", "Subscribed connections per miner address"),
            &["address"],
        )
        .expect("valid metric")
    })
}

pub fn inc_subscriptions() {
    subscriptions().inc();
}

pub fn inc_malformed_messages() {
    malformed_messages().inc();
}

pub fn inc_submissions() {
    submissions().inc();
}

pub fn inc_job_broadcasts() {
    job_broadcasts().inc();
}

pub fn inc_messages_sent(method: &str, count: u64) {
    messages_sent().with_label_values(&[method]).inc_by(count);
}

pub fn inc_connections() {
    active_connections().inc();
}

pub fn dec_connections() {
    active_connections().dec();
}

pub fn set_quarantined_clients(count: usize) {
    quarantined_clients().set(count as i64);
}

pub fn set_current_request_id(id: u64) {
    current_request_id().set(id as i64);
}

// ── Per-miner public helpers ────────────────────────────────────────
pub fn set_miner_hashrate(address: &str, hashrate: f64) {
    miner_hashrate().with_label_values(&[address]).set(hashrate as i64);
}

pub fn inc_miner_connections(address: &str) {
    miner_connections().with_label_values(&[address]).inc();
}

/// Drops the label set once the last connection for `address` goes away
pub fn dec_miner_connections(address: &str) {
    let gauge = miner_connections().with_label_values(&[address]);
    gauge.dec();
    if gauge.get() <= 0 {
        let _ = miner_connections().remove_label_values(&[address]);
        let _ = miner_hashrate().remove_label_values(&[address]);
    }
}

pub fn render() -> String {
    let enc = TextEncoder::new();
    let mut mfs = Vec::new();

    mfs.extend(subscriptions().collect());
    mfs.extend(malformed_messages().collect());
    mfs.extend(submissions().collect());
    mfs.extend(job_broadcasts().collect());
    mfs.extend(messages_sent().collect());
    mfs.extend(active_connections().collect());
    mfs.extend(quarantined_clients().collect());
    mfs.extend(current_request_id().collect());

    // Per-miner labeled metrics
    mfs.extend(miner_hashrate().collect());
    mfs.extend(miner_connections().collect());

    let mut buf = Vec::new();
    let _ = enc.encode(&mfs, &mut buf);
    String::from_utf8_lossy(&buf).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_registered_metrics() {
        inc_job_broadcasts();
        inc_messages_sent("mining.notify", 2);
        set_miner_hashrate("render-test-address", 1234.0);

        let text = render();
        assert!(text.contains("job_broadcasts_total"));
        assert!(text.contains("stratum_messages_sent_total{method=\"mining.notify\"}"));
        assert!(text.contains("miner_hashrate{address=\"render-test-address\"} 1234"));
    }

    #[test]
    fn test_miner_connection_labels_are_dropped() {
        inc_miner_connections("drop-test-address");
        assert!(render().contains("miner_connections{address=\"drop-test-address\"} 1"));

        dec_miner_connections("drop-test-address");
        assert!(!render().contains("drop-test-address"));
    }
}
