//! In-process fakes for relay tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use live_relay_core::{
    Feed, FeedConnector, FeedFrame, MonitorApi, PageRequest,
    traits::{FeedError, UpstreamError},
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Listing items with the given ids, newest first as passed.
pub fn items(ids: &[i64]) -> Vec<Value> {
    ids.iter()
        .map(|id| {
            json!({
                "MESSAGE_ID": id,
                "CREATE_DATE": format!("2024-03-15 20:00:{id:02}"),
            })
        })
        .collect()
}

/// Monitor API serving scripted listings; empty once the script runs out.
#[derive(Default)]
pub struct FakeApi {
    page: Option<String>,
    listings: Mutex<VecDeque<Result<Vec<Value>, UpstreamError>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl FakeApi {
    pub fn with_page(mut self, html: &str) -> Self {
        self.page = Some(html.to_string());
        self
    }

    pub fn with_listings(self, listings: Vec<Result<Vec<Value>, UpstreamError>>) -> Self {
        *self.listings.lock().unwrap() = listings.into();
        self
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn listing_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl MonitorApi for FakeApi {
    async fn fetch_listing(
        &self,
        _subject_id: &str,
        _channel_id: &str,
        page: PageRequest,
        _timeout: Duration,
    ) -> Result<Vec<Value>, UpstreamError> {
        self.requests.lock().unwrap().push(page);
        self.listings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_monitor_page(
        &self,
        _subject_id: &str,
        _channel_id: &str,
    ) -> Result<String, UpstreamError> {
        self.page.clone().ok_or(UpstreamError::Status {
            status: 404,
            body: "not found".into(),
        })
    }
}

enum Script {
    Frames(Vec<FeedFrame>),
    Hold,
    Fail,
}

/// Connector that accepts only configured endpoints and records attempts.
#[derive(Default)]
pub struct FakeConnector {
    scripts: Mutex<HashMap<String, Script>>,
    attempts: Mutex<Vec<String>>,
    closed: Arc<AtomicBool>,
    cancel_on_connect: Option<CancellationToken>,
}

impl FakeConnector {
    /// Accept `endpoint`, deliver `frames`, then end cleanly.
    pub fn accept(self, endpoint: &str, frames: Vec<FeedFrame>) -> Self {
        self.script(endpoint, Script::Frames(frames))
    }

    /// Accept `endpoint` and never deliver anything.
    pub fn accept_and_hold(self, endpoint: &str) -> Self {
        self.script(endpoint, Script::Hold)
    }

    /// Accept `endpoint`, then fail with a transport error.
    pub fn accept_then_fail(self, endpoint: &str) -> Self {
        self.script(endpoint, Script::Fail)
    }

    /// Fire `cancel` while a connection attempt is in progress.
    pub fn cancel_on_connect(mut self, cancel: CancellationToken) -> Self {
        self.cancel_on_connect = Some(cancel);
        self
    }

    fn script(self, endpoint: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), script);
        self
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn feed_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedConnector for FakeConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Feed>, FeedError> {
        self.attempts.lock().unwrap().push(endpoint.to_string());
        if let Some(cancel) = &self.cancel_on_connect {
            cancel.cancel();
        }
        let script = self
            .scripts
            .lock()
            .unwrap()
            .remove(endpoint)
            .ok_or_else(|| FeedError::Connect {
                endpoint: endpoint.to_string(),
                reason: "connection refused".into(),
            })?;
        Ok(Box::new(ScriptedFeed {
            script,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct ScriptedFeed {
    script: Script,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Feed for ScriptedFeed {
    async fn next_frame(&mut self) -> Option<Result<FeedFrame, FeedError>> {
        match &mut self.script {
            Script::Frames(frames) if frames.is_empty() => None,
            Script::Frames(frames) => Some(Ok(frames.remove(0))),
            Script::Hold => std::future::pending().await,
            Script::Fail => Some(Err(FeedError::KeepaliveTimeout(Duration::from_secs(10)))),
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
