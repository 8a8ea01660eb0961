//! REST client for the monitor API.

use std::time::Duration;

use async_trait::async_trait;
use live_relay_core::{
    MonitorApi, PageRequest,
    item::ListingResponse,
    traits::UpstreamError,
};
use reqwest::{
    RequestBuilder, Url,
    header::{self, HeaderMap, HeaderValue, InvalidHeaderValue},
};
use serde_json::Value;

use crate::config::{USER_AGENT, UpstreamConfig};

/// Client construction error.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Monitor API client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct MonitorClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl MonitorClient {
    /// Create a client with browser-like default headers.
    ///
    /// # Errors
    /// Returns error if the configured referer is not a valid header or the
    /// TLS backend fails to initialize.
    pub fn new(config: UpstreamConfig) -> Result<Self, ClientBuildError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(header::REFERER, HeaderValue::from_str(&config.referer)?);

        let http = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self { http, config })
    }

    /// Raw monitor listing.
    ///
    /// # Errors
    /// Returns error on transport failure, timeout or non-2xx status.
    pub async fn monitor(
        &self,
        subject_id: &str,
        channel_id: &str,
        page: PageRequest,
    ) -> Result<Value, UpstreamError> {
        let url = join(&self.config.monitor_base, &[subject_id, channel_id])?;
        let request = self
            .http
            .get(url)
            .query(&[("page", page.page), ("perPage", page.per_page)])
            .timeout(self.config.request_timeout);
        send_json(request).await
    }

    /// Broadcast statistics, optionally narrowed to one statistic type.
    ///
    /// # Errors
    /// Returns error on transport failure, timeout or non-2xx status.
    pub async fn stats(
        &self,
        subject_id: &str,
        channel_id: &str,
        stat_type: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let url = join(&self.config.monitor_base, &[subject_id, channel_id, "stats"])?;
        let mut request = self.http.get(url).timeout(self.config.request_timeout);
        if let Some(stat_type) = stat_type {
            request = request.query(&[("type", stat_type)]);
        }
        send_json(request).await
    }

    /// Previous broadcast sessions.
    ///
    /// # Errors
    /// Returns error on transport failure, timeout or non-2xx status.
    pub async fn history(&self, subject_id: &str, channel_id: &str) -> Result<Value, UpstreamError> {
        let url = join(
            &self.config.monitor_base,
            &[subject_id, channel_id, "history"],
        )?;
        send_json(self.http.get(url).timeout(self.config.request_timeout)).await
    }

    /// Station record of a subject, including the live broadcast if any.
    ///
    /// # Errors
    /// Returns error on transport failure, timeout or non-2xx status.
    pub async fn station(&self, subject_id: &str) -> Result<Value, UpstreamError> {
        let url = join(&self.config.station_base, &[subject_id, "station"])?;
        send_json(self.http.get(url).timeout(self.config.station_timeout)).await
    }
}

#[async_trait]
impl MonitorApi for MonitorClient {
    async fn fetch_listing(
        &self,
        subject_id: &str,
        channel_id: &str,
        page: PageRequest,
        timeout: Duration,
    ) -> Result<Vec<Value>, UpstreamError> {
        let url = join(&self.config.monitor_base, &[subject_id, channel_id])?;
        let request = self
            .http
            .get(url)
            .query(&[("page", page.page), ("perPage", page.per_page)])
            .timeout(timeout);

        let body = checked(request).await?.bytes().await.map_err(map_err)?;
        let listing: ListingResponse =
            serde_json::from_slice(&body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(listing.into_items())
    }

    async fn fetch_monitor_page(
        &self,
        subject_id: &str,
        channel_id: &str,
    ) -> Result<String, UpstreamError> {
        let url = join(&self.config.page_base, &[subject_id, channel_id])?;
        let request = self.http.get(url).timeout(self.config.page_timeout);
        checked(request).await?.text().await.map_err(map_err)
    }
}

/// Append path segments to a base URL, percent-encoding each one.
fn join(base: &str, segments: &[&str]) -> Result<Url, UpstreamError> {
    let mut url =
        Url::parse(base).map_err(|e| UpstreamError::Transport(format!("bad base {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| UpstreamError::Transport(format!("base cannot take a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn checked(request: RequestBuilder) -> Result<reqwest::Response, UpstreamError> {
    let response = request.send().await.map_err(map_err)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn send_json(request: RequestBuilder) -> Result<Value, UpstreamError> {
    checked(request).await?.json().await.map_err(map_err)
}

fn map_err(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout
    } else if e.is_decode() {
        UpstreamError::Decode(e.to_string())
    } else {
        UpstreamError::Transport(e.to_string())
    }
}
