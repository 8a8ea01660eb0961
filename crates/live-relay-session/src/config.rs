//! Relay tuning.

use std::time::Duration;

/// Placeholder substituted with the subject id in feed endpoint templates.
pub const SUBJECT_PLACEHOLDER: &str = "{subject_id}";

/// Direct feed endpoints, in the order they are tried.
pub const DEFAULT_FEED_ENDPOINTS: [&str; 3] = [
    "wss://chat.afreecatv.com:9443/Websocket/{subject_id}",
    "wss://live.afreecatv.com:9443/Websocket/{subject_id}",
    "wss://chat-ws.afreecatv.com/Websocket/{subject_id}",
];

/// Relay session configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Feed endpoint templates, highest priority first.
    pub feed_endpoints: Vec<String>,
    /// Sleep between polls.
    pub poll_interval: Duration,
    /// Page size of the first poll.
    pub initial_page_size: u32,
    /// Page size of every later poll.
    pub poll_page_size: u32,
    /// Timeout of the first poll.
    pub initial_fetch_timeout: Duration,
    /// Timeout of every later poll.
    pub poll_fetch_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            feed_endpoints: DEFAULT_FEED_ENDPOINTS.iter().map(ToString::to_string).collect(),
            poll_interval: Duration::from_millis(300),
            initial_page_size: 100,
            poll_page_size: 20,
            initial_fetch_timeout: Duration::from_secs(10),
            poll_fetch_timeout: Duration::from_secs(5),
        }
    }
}

impl RelayConfig {
    /// Concrete feed URLs for a subject, highest priority first.
    #[must_use]
    pub fn feed_candidates(&self, subject_id: &str) -> Vec<String> {
        self.feed_endpoints
            .iter()
            .map(|template| template.replace(SUBJECT_PLACEHOLDER, subject_id))
            .collect()
    }
}
