//! Upstream clients for the live broadcast relay.
//!
//! Provides:
//! - `MonitorClient` - REST client for listings, stats, history and pages
//! - `WsFeedConnector` - Direct feed connector with keepalive probes

pub mod config;
pub mod feed;
pub mod http;

pub use config::{FeedConfig, UpstreamConfig};
pub use feed::WsFeedConnector;
pub use http::MonitorClient;
