//! HTTP and WebSocket surface for the live broadcast relay.
//!
//! Provides:
//! - REST pass-through handlers for monitor, stats, history and station lookup
//! - WebSocket relay sessions (`/ws/monitor/{subject_id}/{channel_id}`)

pub mod error;
pub mod routes;
pub mod websocket;

use std::sync::Arc;

use axum::{Router, routing::get};
use live_relay_session::{Relay, RelayConfig};
use live_relay_upstream::{FeedConfig, MonitorClient, WsFeedConnector};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::ApiError;

/// Relay wired to the real upstream clients.
pub type LiveRelay = Relay<Arc<MonitorClient>, WsFeedConnector>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// REST client used by the pass-through handlers.
    pub client: Arc<MonitorClient>,
    /// Relay driver for WebSocket sessions.
    pub relay: Arc<LiveRelay>,
    /// Cancelled on server shutdown; every session holds a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create state around one shared upstream client.
    #[must_use]
    pub fn new(
        client: MonitorClient,
        feed: FeedConfig,
        relay: RelayConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let client = Arc::new(client);
        let relay = Relay::new(Arc::clone(&client), WsFeedConnector::new(feed), relay);
        Self {
            client,
            relay: Arc::new(relay),
            shutdown,
        }
    }
}

/// Build the full router.
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/api/find-station/{subject_id}", get(routes::find_station))
        .route("/monitor/{subject_id}/{channel_id}", get(routes::monitor))
        .route("/monitor/{subject_id}/{channel_id}/stats", get(routes::stats))
        .route(
            "/monitor/{subject_id}/{channel_id}/history",
            get(routes::history),
        )
        .route(
            "/ws/monitor/{subject_id}/{channel_id}",
            get(websocket::ws_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
