//! Seams between the relay and the outside world.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::DownstreamFrame;

/// Page selector for the monitor listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
}

impl PageRequest {
    /// First page with the given size.
    #[must_use]
    pub const fn first(per_page: u32) -> Self {
        Self { page: 1, per_page }
    }
}

/// Upstream REST error.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Transport(String),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Whether the failure is expected to clear up on a later attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }
}

/// Trait for the monitor REST API.
#[async_trait]
pub trait MonitorApi: Send + Sync {
    /// Fetch one page of the item listing, newest first.
    async fn fetch_listing(
        &self,
        subject_id: &str,
        channel_id: &str,
        page: PageRequest,
        timeout: Duration,
    ) -> Result<Vec<Value>, UpstreamError>;

    /// Fetch the monitor HTML page for a broadcast.
    async fn fetch_monitor_page(
        &self,
        subject_id: &str,
        channel_id: &str,
    ) -> Result<String, UpstreamError>;
}

#[async_trait]
impl<T: MonitorApi + ?Sized> MonitorApi for Arc<T> {
    async fn fetch_listing(
        &self,
        subject_id: &str,
        channel_id: &str,
        page: PageRequest,
        timeout: Duration,
    ) -> Result<Vec<Value>, UpstreamError> {
        (**self)
            .fetch_listing(subject_id, channel_id, page, timeout)
            .await
    }

    async fn fetch_monitor_page(
        &self,
        subject_id: &str,
        channel_id: &str,
    ) -> Result<String, UpstreamError> {
        (**self).fetch_monitor_page(subject_id, channel_id).await
    }
}

/// Direct feed error.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no pong within {0:?}")]
    KeepaliveTimeout(Duration),
}

/// One application frame received from a direct feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// An open direct feed.
///
/// Dropping the feed releases the underlying connection.
#[async_trait]
pub trait Feed: Send {
    /// Next application frame. `None` once the feed has ended cleanly.
    async fn next_frame(&mut self) -> Option<Result<FeedFrame, FeedError>>;

    /// Close the feed gracefully.
    async fn close(&mut self);
}

/// Trait for opening direct feeds.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Open a feed against a single endpoint URL.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Feed>, FeedError>;
}

#[async_trait]
impl<T: FeedConnector + ?Sized> FeedConnector for Arc<T> {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Feed>, FeedError> {
        (**self).connect(endpoint).await
    }
}

/// Downstream error.
#[derive(Debug, Error)]
pub enum DownstreamError {
    #[error("client disconnected")]
    Closed,
}

/// The single client a relay session writes to.
#[async_trait]
pub trait Downstream: Send {
    /// Write one frame.
    async fn send(&mut self, frame: DownstreamFrame) -> Result<(), DownstreamError>;

    /// Whether the client is already gone.
    fn is_closed(&self) -> bool;
}
