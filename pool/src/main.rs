// Ferrous Pool - Stratum mining server
//
// Core: Stratum server, stats scheduler
// Ops: /metrics (Prometheus), /health

use anyhow::{Context, Result};
use axum::{extract::State, http::{header, StatusCode}, response::IntoResponse, routing::get, Json};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ferrous_pool::config::Config;
use ferrous_pool::jobs::Job;
use ferrous_pool::metrics::prometheus as metrics;
use ferrous_pool::pool::MemoryPool;
use ferrous_pool::stratum::StratumServer;

#[derive(Clone)]
struct ApiState {
    server: Arc<StratumServer>,
    start_time: i64,
}

async fn api_health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "clients": state.server.client_count().await,
        "connections": state.server.connection_count().await,
        "has_work": state.server.has_work().await,
        "uptime_secs": Utc::now().timestamp().saturating_sub(state.start_time),
    }))
}

async fn api_metrics() -> impl IntoResponse {
    let body = metrics::render();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let ctrl_c = tokio::signal::ctrl_c();
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("SIGTERM — shutting down"),
                    _ = ctrl_c => tracing::info!("SIGINT — shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", e);
                let _ = ctrl_c.await;
                tracing::info!("SIGINT — shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Ctrl+C — shutting down");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::info!("🚀 Ferrous Pool v{}", env!("CARGO_PKG_VERSION"));
    let cfg = Config::load()?;

    let pool = Arc::new(MemoryPool::new(cfg.pool_name.clone(), cfg.target.clone()));
    let server = Arc::new(StratumServer::new(&cfg, pool)?);

    // Start Stratum server
    {
        let server = server.clone();
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                tracing::error!("Stratum server error: {:#}", e);
            }
        });
    }

    // Synthetic jobs when no node is feeding work
    if let Some(period) = cfg.demo_work_interval() {
        let server_weak = Arc::downgrade(&server);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut request_id = 0u64;
            tracing::info!("🧪 Demo work enabled (every {:?})", period);
            loop {
                interval.tick().await;
                let Some(server) = server_weak.upgrade() else { break };
                request_id += 1;
                let job = Job::placeholder(request_id);
                if let Err(e) = server.new_work(job.mining_request_id, job.header).await {
                    tracing::error!("Failed to broadcast demo work: {}", e);
                }
            }
        });
    }

    let api_state = ApiState {
        server: server.clone(),
        start_time: Utc::now().timestamp(),
    };

    let api = axum::Router::new()
        .route("/health", get(api_health))
        .route("/metrics", get(api_metrics))
        .with_state(api_state);

    let listener = tokio::net::TcpListener::bind(&cfg.metrics_listen)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", cfg.metrics_listen))?;

    tracing::info!("📡 Metrics listening on {}", cfg.metrics_listen);
    axum::serve(listener, api)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    server.shutdown().await;
    tracing::info!("🏁 Ferrous Pool shut down cleanly");
    Ok(())
}
