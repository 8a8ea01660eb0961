//! Per-connection relay record.

use serde_json::Value;

use crate::item::{created_at, item_id};

/// State owned by a single relay session.
///
/// Created when a client connects and dropped when the session ends; nothing
/// survives a reconnect.
#[derive(Debug, Clone)]
pub struct Session {
    subject_id: String,
    channel_id: String,
    /// Resolved once at session start.
    pub broadcast_start: Option<String>,
    /// Identifier of the newest item forwarded by the polling path.
    pub last_seen_item_id: Option<Value>,
    /// Set once a direct feed accepted a connection.
    pub upstream_feed_connected: bool,
}

impl Session {
    /// Create a new session for a subject and channel.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            channel_id: channel_id.into(),
            broadcast_start: None,
            last_seen_item_id: None,
            upstream_feed_connected: false,
        }
    }

    /// Monitored broadcaster.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Broadcast instance.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Record the first polling batch.
    ///
    /// Returns the start time to announce with it: the resolved one, or the
    /// creation time of the oldest item in the batch.
    pub fn accept_initial(&mut self, items: &[Value]) -> Option<String> {
        self.last_seen_item_id = items.first().and_then(item_id).cloned();
        self.broadcast_start
            .clone()
            .or_else(|| items.last().and_then(created_at).map(str::to_string))
    }

    /// Compute the delta of a poll response against the last forwarded item.
    ///
    /// `items` must be newest-first. The scan stops at the first item whose
    /// id equals the last seen one. On a non-empty delta the last seen id
    /// advances to the newest item.
    pub fn take_delta(&mut self, items: Vec<Value>) -> Option<Vec<Value>> {
        let newest = items.first().and_then(item_id).cloned();
        if items.is_empty() || newest == self.last_seen_item_id {
            return None;
        }

        let last_seen = self.last_seen_item_id.as_ref();
        let delta: Vec<Value> = items
            .into_iter()
            .take_while(|item| item_id(item) != last_seen)
            .collect();

        if delta.is_empty() {
            return None;
        }
        self.last_seen_item_id = newest;
        Some(delta)
    }
}
