//! Relay session orchestration.
//!
//! Provides:
//! - `Relay` - Per-connection state machine: resolve, try feeds, fall back to polling
//! - `RelayConfig` - Candidate endpoints, page sizes and timings

pub mod config;
mod direct;
mod polling;
pub mod relay;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use config::RelayConfig;
pub use relay::{EndReason, Relay, RelayOutcome, RelayPath};
