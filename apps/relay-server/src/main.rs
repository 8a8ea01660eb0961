//! Live broadcast relay server.
//!
//! Run with: cargo run -p live-relay-server -- --bind 0.0.0.0:8000

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use live_relay_session::{RelayConfig, config::DEFAULT_FEED_ENDPOINTS};
use live_relay_transport::{AppState, create_router};
use live_relay_upstream::{FeedConfig, MonitorClient, UpstreamConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "live-relay")]
#[command(about = "Relays live broadcast events to WebSocket clients", long_about = None)]
struct Args {
    /// Listen address
    #[arg(long, env = "RELAY_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Monitor REST API base URL
    #[arg(long, env = "RELAY_MONITOR_BASE", default_value = "https://bcraping.kr/api/monitor")]
    monitor_base: String,

    /// Monitor HTML page base URL
    #[arg(long, env = "RELAY_PAGE_BASE", default_value = "https://bcraping.kr/monitor")]
    page_base: String,

    /// Station lookup API base URL
    #[arg(long, env = "RELAY_STATION_BASE", default_value = "https://bjapi.afreecatv.com/api")]
    station_base: String,

    /// Feed endpoint template, tried in order; `{subject_id}` is substituted
    #[arg(
        long = "feed-endpoint",
        env = "RELAY_FEED_ENDPOINTS",
        value_delimiter = ',',
        default_values_t = DEFAULT_FEED_ENDPOINTS.map(String::from)
    )]
    feed_endpoints: Vec<String>,

    /// Delay between polls in the fallback path
    #[arg(long, env = "RELAY_POLL_INTERVAL_MS", default_value_t = 300)]
    poll_interval_ms: u64,

    /// Log output format
    #[arg(long, env = "RELAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let client = MonitorClient::new(UpstreamConfig {
        monitor_base: args.monitor_base,
        page_base: args.page_base,
        station_base: args.station_base,
        ..UpstreamConfig::default()
    })
    .context("failed to build upstream client")?;

    let relay = RelayConfig {
        feed_endpoints: args.feed_endpoints,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        ..RelayConfig::default()
    };
    tracing::info!(feeds = ?relay.feed_endpoints, "Relay configured");

    let shutdown = CancellationToken::new();
    let state = AppState::new(client, FeedConfig::default(), relay, shutdown.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!("Server listening on http://{}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
