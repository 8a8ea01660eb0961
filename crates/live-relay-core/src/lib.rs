//! Core types and seams for the live broadcast relay.
//!
//! This crate provides the fundamental building blocks:
//! - `Session` - Per-connection relay record with delta tracking
//! - `RelayMessage` / `DownstreamFrame` - What the relay emits to clients
//! - `extract_broadcast_start` - Start time scraping from the monitor page
//! - `MonitorApi`, `FeedConnector`, `Downstream` traits

pub mod downstream;
pub mod item;
pub mod protocol;
pub mod session;
pub mod start_time;
pub mod traits;

pub use downstream::ChannelDownstream;
pub use protocol::{DownstreamFrame, RelayMessage};
pub use session::Session;
pub use start_time::extract_broadcast_start;
pub use traits::{Downstream, Feed, FeedConnector, FeedFrame, MonitorApi, PageRequest};
