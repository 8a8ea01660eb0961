//! Upstream endpoints, headers and timeouts.

use std::time::Duration;

/// Browser-like user agent sent with every upstream request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// REST and page-scraping configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base of the monitor REST API (`{base}/{subject}/{channel}`).
    pub monitor_base: String,
    /// Base of the monitor HTML pages (`{base}/{subject}/{channel}`).
    pub page_base: String,
    /// Base of the station lookup API (`{base}/{subject}/station`).
    pub station_base: String,
    /// `Referer` sent with REST requests.
    pub referer: String,
    /// Timeout for pass-through requests.
    pub request_timeout: Duration,
    /// Timeout for the monitor page fetch.
    pub page_timeout: Duration,
    /// Timeout for the station lookup.
    pub station_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            monitor_base: "https://bcraping.kr/api/monitor".into(),
            page_base: "https://bcraping.kr/monitor".into(),
            station_base: "https://bjapi.afreecatv.com/api".into(),
            referer: "https://bcraping.kr/".into(),
            request_timeout: Duration::from_secs(30),
            page_timeout: Duration::from_secs(10),
            station_timeout: Duration::from_secs(10),
        }
    }
}

/// Direct feed handshake and keepalive configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// `Origin` sent with the handshake.
    pub origin: String,
    /// Handshake timeout per candidate.
    pub connect_timeout: Duration,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// How long to wait for the pong before declaring the peer dead.
    pub ping_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            origin: "https://play.afreecatv.com".into(),
            connect_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(20),
            ping_timeout: Duration::from_secs(10),
        }
    }
}
