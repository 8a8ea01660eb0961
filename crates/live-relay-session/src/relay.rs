//! Per-connection relay state machine.
//!
//! ```text
//! Resolving ──► TryingFeed(0) ──fail──► TryingFeed(1) ──fail──► … ──► Polling ──► Closed
//!                    │                        │
//!                    └──────── ok ────────────┴──► FeedActive ──────────────────► Closed
//! ```
//!
//! Once a feed connects or every candidate has failed, the path is fixed for
//! the rest of the session.

use std::future::Future;

use live_relay_core::{
    Downstream, DownstreamFrame, Feed, FeedConnector, MonitorApi, Session,
};
use tokio_util::sync::CancellationToken;

use crate::{config::RelayConfig, direct, polling, resolver::resolve_broadcast_start};

/// Which upstream path served a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayPath {
    /// A direct feed accepted the connection.
    DirectFeed { endpoint: String },
    /// Every feed candidate failed.
    Polling,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Client disconnected or the server is shutting down.
    Cancelled,
    /// A downstream write failed.
    DownstreamClosed,
    /// The feed closed cleanly.
    FeedEnded,
    /// The feed failed (transport error or keepalive expiry).
    FeedLost(String),
    /// Unexpected fault in the polling loop.
    Fault(String),
}

/// Result of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Path chosen, if the session got that far.
    pub path: Option<RelayPath>,
    /// Why it ended.
    pub end: EndReason,
}

enum RelayState {
    Resolving,
    TryingFeed(usize),
    FeedActive(Box<dyn Feed>),
    Polling,
    Closed(EndReason),
}

impl RelayState {
    /// Next state after candidate `index` of `total` failed to connect.
    const fn after_feed_failure(index: usize, total: usize) -> Self {
        if index + 1 < total {
            Self::TryingFeed(index + 1)
        } else {
            Self::Polling
        }
    }
}

/// Relay driver shared by all sessions.
///
/// Holds no per-session state; every call to [`Relay::run`] works on its own
/// [`Session`].
pub struct Relay<A, C> {
    api: A,
    connector: C,
    config: RelayConfig,
}

impl<A, C> Relay<A, C>
where
    A: MonitorApi,
    C: FeedConnector,
{
    /// Create a new relay.
    #[must_use]
    pub const fn new(api: A, connector: C, config: RelayConfig) -> Self {
        Self {
            api,
            connector,
            config,
        }
    }

    /// Run one session until the client leaves or the upstream path ends.
    pub async fn run<D: Downstream>(
        &self,
        session: &mut Session,
        downstream: &mut D,
        cancel: &CancellationToken,
    ) -> RelayOutcome {
        let candidates = self.config.feed_candidates(session.subject_id());
        let mut path = None;
        let mut state = RelayState::Resolving;

        loop {
            if cancel.is_cancelled() && !matches!(state, RelayState::Closed(_)) {
                if let RelayState::FeedActive(mut feed) = state {
                    feed.close().await;
                }
                state = RelayState::Closed(EndReason::Cancelled);
            }

            state = match state {
                RelayState::Resolving => {
                    let resolved = until_cancelled(
                        cancel,
                        resolve_broadcast_start(&self.api, session.subject_id(), session.channel_id()),
                    )
                    .await;
                    session.broadcast_start = resolved.flatten();
                    if candidates.is_empty() {
                        RelayState::Polling
                    } else {
                        RelayState::TryingFeed(0)
                    }
                }
                RelayState::TryingFeed(index) => {
                    let endpoint = &candidates[index];
                    tracing::info!(%endpoint, "Connecting to feed");
                    match until_cancelled(cancel, self.connector.connect(endpoint)).await {
                        None => RelayState::Closed(EndReason::Cancelled),
                        Some(Ok(feed)) => {
                            tracing::info!(%endpoint, "Feed connected");
                            session.upstream_feed_connected = true;
                            path = Some(RelayPath::DirectFeed {
                                endpoint: endpoint.clone(),
                            });
                            RelayState::FeedActive(feed)
                        }
                        Some(Err(e)) => {
                            tracing::warn!(%endpoint, "Feed connection failed: {e}");
                            RelayState::after_feed_failure(index, candidates.len())
                        }
                    }
                }
                RelayState::FeedActive(feed) => {
                    RelayState::Closed(direct::relay_feed(feed, session, downstream, cancel).await)
                }
                RelayState::Polling => {
                    tracing::warn!("No feed reachable, falling back to polling");
                    path = Some(RelayPath::Polling);
                    RelayState::Closed(
                        polling::poll(&self.api, &self.config, session, downstream, cancel).await,
                    )
                }
                RelayState::Closed(end) => {
                    tracing::info!(?path, ?end, "Relay session finished");
                    return RelayOutcome { path, end };
                }
            };
        }
    }
}

/// Await `fut` unless `cancel` fires first.
pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Write one frame, checking for cancellation and a gone client first.
pub(crate) async fn emit<D: Downstream>(
    downstream: &mut D,
    cancel: &CancellationToken,
    frame: impl Into<DownstreamFrame>,
) -> Result<(), EndReason> {
    if cancel.is_cancelled() {
        return Err(EndReason::Cancelled);
    }
    if downstream.is_closed() {
        return Err(EndReason::DownstreamClosed);
    }
    match until_cancelled(cancel, downstream.send(frame.into())).await {
        None => Err(EndReason::Cancelled),
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => {
            tracing::debug!("Downstream write failed: {e}");
            Err(EndReason::DownstreamClosed)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use live_relay_core::{ChannelDownstream, FeedFrame, RelayMessage, traits::UpstreamError};
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    use super::*;
    use crate::testing::{FakeApi, FakeConnector, items};

    type TestRelay = Relay<Arc<FakeApi>, Arc<FakeConnector>>;

    fn config(endpoints: &[&str]) -> RelayConfig {
        RelayConfig {
            feed_endpoints: endpoints.iter().map(ToString::to_string).collect(),
            ..RelayConfig::default()
        }
    }

    fn spawn_session(
        relay: Arc<TestRelay>,
        cancel: CancellationToken,
    ) -> (
        mpsc::Receiver<DownstreamFrame>,
        tokio::task::JoinHandle<(Session, RelayOutcome)>,
    ) {
        let (mut downstream, rx) = ChannelDownstream::channel(16);
        let task = tokio::spawn(async move {
            let mut session = Session::new("bj", "7");
            let outcome = relay.run(&mut session, &mut downstream, &cancel).await;
            (session, outcome)
        });
        (rx, task)
    }

    fn message(frame: Option<DownstreamFrame>) -> RelayMessage {
        match frame {
            Some(DownstreamFrame::Message(msg)) => msg,
            other => panic!("expected relay message, got {other:?}"),
        }
    }

    fn message_ids(data: &[Value]) -> Vec<i64> {
        data.iter().filter_map(|i| i["MESSAGE_ID"].as_i64()).collect()
    }

    #[tokio::test]
    async fn test_failover_tries_each_candidate_once_in_order() {
        let api = Arc::new(FakeApi::default().with_page("<i>24.03.15 20:00:00</i>"));
        let connector = Arc::new(FakeConnector::default().accept(
            "ws://c/bj",
            vec![
                FeedFrame::Text(r#"{"chat":"hi","broadcast_start":"stale"}"#.into()),
                FeedFrame::Text("PING|not json".into()),
                FeedFrame::Text("[1,2]".into()),
                FeedFrame::Binary(vec![9, 9]),
            ],
        ));
        let relay = Arc::new(Relay::new(
            Arc::clone(&api),
            Arc::clone(&connector),
            config(&["ws://a/{subject_id}", "ws://b/{subject_id}", "ws://c/{subject_id}"]),
        ));

        let (mut rx, task) = spawn_session(relay, CancellationToken::new());
        let (session, outcome) = task.await.unwrap();

        assert_eq!(connector.attempts(), vec!["ws://a/bj", "ws://b/bj", "ws://c/bj"]);
        assert_eq!(api.listing_calls(), 0);
        assert!(session.upstream_feed_connected);
        assert_eq!(
            outcome,
            RelayOutcome {
                path: Some(RelayPath::DirectFeed {
                    endpoint: "ws://c/bj".into()
                }),
                end: EndReason::FeedEnded,
            }
        );
        assert!(connector.feed_closed());

        assert_eq!(
            message(rx.recv().await),
            RelayMessage::BroadcastStart {
                broadcast_start: "2024-03-15 20:00:00".into()
            }
        );
        assert_eq!(
            rx.recv().await,
            Some(DownstreamFrame::Raw(
                json!({ "chat": "hi", "broadcast_start": "2024-03-15 20:00:00" })
            ))
        );
        // The malformed frame is dropped without ending the feed.
        assert_eq!(rx.recv().await, Some(DownstreamFrame::Raw(json!([1, 2]))));
        assert_eq!(rx.recv().await, Some(DownstreamFrame::Binary(vec![9, 9])));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_feed_without_start_sends_no_announcement() {
        let api = Arc::new(FakeApi::default());
        let connector = Arc::new(
            FakeConnector::default().accept("ws://a/bj", vec![FeedFrame::Text(r#"{"n":1}"#.into())]),
        );
        let relay = Arc::new(Relay::new(api, connector, config(&["ws://a/{subject_id}"])));

        let (mut rx, task) = spawn_session(relay, CancellationToken::new());
        let (_, outcome) = task.await.unwrap();

        assert_eq!(outcome.end, EndReason::FeedEnded);
        assert_eq!(rx.recv().await, Some(DownstreamFrame::Raw(json!({ "n": 1 }))));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_lost_feed_does_not_reconnect_or_poll() {
        let api = Arc::new(FakeApi::default());
        let connector = Arc::new(FakeConnector::default().accept_then_fail("ws://a/bj"));
        let relay = Arc::new(Relay::new(
            Arc::clone(&api),
            Arc::clone(&connector),
            config(&["ws://a/{subject_id}", "ws://b/{subject_id}"]),
        ));

        let (_rx, task) = spawn_session(relay, CancellationToken::new());
        let (_, outcome) = task.await.unwrap();

        assert!(matches!(outcome.end, EndReason::FeedLost(_)));
        assert_eq!(connector.attempts(), vec!["ws://a/bj"]);
        assert_eq!(api.listing_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_sends_initial_then_deltas() {
        let api = Arc::new(FakeApi::default().with_listings(vec![
            Ok(items(&[3, 2, 1])),
            Ok(items(&[3, 2, 1])),
            Ok(items(&[5, 4, 3, 2, 1])),
        ]));
        let connector = Arc::new(FakeConnector::default());
        let relay = Arc::new(Relay::new(
            Arc::clone(&api),
            Arc::clone(&connector),
            config(&["ws://a/{subject_id}", "ws://b/{subject_id}"]),
        ));
        let cancel = CancellationToken::new();

        let (mut rx, task) = spawn_session(relay, cancel.clone());

        match message(rx.recv().await) {
            RelayMessage::Initial {
                data,
                broadcast_start,
            } => {
                assert_eq!(message_ids(&data), vec![3, 2, 1]);
                assert_eq!(broadcast_start.as_deref(), Some("2024-03-15 20:00:01"));
            }
            other => panic!("expected initial, got {other:?}"),
        }
        match message(rx.recv().await) {
            RelayMessage::Update { data } => assert_eq!(message_ids(&data), vec![5, 4]),
            other => panic!("expected update, got {other:?}"),
        }

        cancel.cancel();
        let (session, outcome) = task.await.unwrap();
        assert_eq!(outcome.path, Some(RelayPath::Polling));
        assert_eq!(outcome.end, EndReason::Cancelled);
        assert_eq!(session.last_seen_item_id, Some(json!(5)));
        assert!(!session.upstream_feed_connected);
        assert_eq!(connector.attempts(), vec!["ws://a/bj", "ws://b/bj"]);

        let requests = api.requests();
        assert_eq!(requests[0].per_page, 100);
        assert!(requests[1..].iter().all(|r| r.per_page == 20 && r.page == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_are_reported_and_polling_continues() {
        let api = Arc::new(FakeApi::default().with_listings(vec![
            Ok(items(&[1])),
            Err(UpstreamError::Timeout),
            Err(UpstreamError::Status {
                status: 503,
                body: "busy".into(),
            }),
            Ok(items(&[2, 1])),
        ]));
        let relay = Arc::new(Relay::new(api, Arc::new(FakeConnector::default()), config(&[])));
        let cancel = CancellationToken::new();
        let (mut rx, task) = spawn_session(relay, cancel.clone());

        assert!(matches!(message(rx.recv().await), RelayMessage::Initial { .. }));
        assert_eq!(
            message(rx.recv().await),
            RelayMessage::error("data fetch failed: request timed out")
        );
        assert_eq!(
            message(rx.recv().await),
            RelayMessage::error("data fetch failed: upstream returned 503: busy")
        );
        match message(rx.recv().await) {
            RelayMessage::Update { data } => assert_eq!(message_ids(&data), vec![2]),
            other => panic!("expected update, got {other:?}"),
        }

        cancel.cancel();
        let (_, outcome) = task.await.unwrap();
        assert_eq!(outcome.end, EndReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_failure_reports_once_then_ends() {
        let api = Arc::new(FakeApi::default().with_listings(vec![
            Err(UpstreamError::Transport("refused".into())),
            Ok(items(&[2, 1])),
        ]));
        let relay = Arc::new(Relay::new(
            Arc::clone(&api),
            Arc::new(FakeConnector::default()),
            config(&[]),
        ));
        let (mut rx, task) = spawn_session(relay, CancellationToken::new());

        assert_eq!(
            message(rx.recv().await),
            RelayMessage::error("relay error: connection failed: refused")
        );
        assert_eq!(rx.recv().await, None);

        let (_, outcome) = task.await.unwrap();
        assert_eq!(outcome.path, Some(RelayPath::Polling));
        assert!(matches!(outcome.end, EndReason::Fault(_)));
        assert_eq!(api.listing_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_internal_fault_reported_once_then_ends() {
        let api = Arc::new(FakeApi::default().with_listings(vec![
            Ok(items(&[1])),
            Err(UpstreamError::Decode("expected value".into())),
            Ok(items(&[2, 1])),
        ]));
        let relay = Arc::new(Relay::new(
            Arc::clone(&api),
            Arc::new(FakeConnector::default()),
            config(&[]),
        ));
        let (mut rx, task) = spawn_session(relay, CancellationToken::new());

        assert!(matches!(message(rx.recv().await), RelayMessage::Initial { .. }));
        assert!(matches!(message(rx.recv().await), RelayMessage::Error { .. }));
        assert_eq!(rx.recv().await, None);

        let (_, outcome) = task.await.unwrap();
        assert!(matches!(outcome.end, EndReason::Fault(_)));
        assert_eq!(api.listing_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_during_sleep_stops_before_next_fetch() {
        let api = Arc::new(FakeApi::default().with_listings(vec![Ok(items(&[1]))]));
        let relay = Arc::new(Relay::new(
            Arc::clone(&api),
            Arc::new(FakeConnector::default()),
            config(&[]),
        ));
        let cancel = CancellationToken::new();
        let (mut rx, task) = spawn_session(relay, cancel.clone());

        assert!(matches!(message(rx.recv().await), RelayMessage::Initial { .. }));
        cancel.cancel();
        let (_, outcome) = task.await.unwrap();

        assert_eq!(outcome.end, EndReason::Cancelled);
        assert_eq!(api.listing_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_client_ends_polling() {
        let api = Arc::new(FakeApi::default().with_listings(vec![Ok(items(&[1]))]));
        let relay = Arc::new(Relay::new(
            Arc::clone(&api),
            Arc::new(FakeConnector::default()),
            config(&[]),
        ));
        let (mut rx, task) = spawn_session(relay, CancellationToken::new());

        assert!(matches!(message(rx.recv().await), RelayMessage::Initial { .. }));
        drop(rx);

        let (_, outcome) = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.end, EndReason::DownstreamClosed);
        assert_eq!(api.listing_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_feed_active_closes_feed() {
        let connector = Arc::new(FakeConnector::default().accept_and_hold("ws://a/bj"));
        let relay = Arc::new(Relay::new(
            Arc::new(FakeApi::default()),
            Arc::clone(&connector),
            config(&["ws://a/{subject_id}"]),
        ));
        let cancel = CancellationToken::new();
        let (_rx, task) = spawn_session(relay, cancel.clone());

        while connector.attempts().is_empty() {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        cancel.cancel();
        let (_, outcome) = task.await.unwrap();

        assert_eq!(outcome.end, EndReason::Cancelled);
        assert_eq!(
            outcome.path,
            Some(RelayPath::DirectFeed {
                endpoint: "ws://a/bj".into()
            })
        );
        assert!(connector.feed_closed());
    }

    #[tokio::test]
    async fn test_cancel_right_after_connect_closes_feed() {
        let cancel = CancellationToken::new();
        let connector = Arc::new(
            FakeConnector::default()
                .accept_and_hold("ws://a/bj")
                .cancel_on_connect(cancel.clone()),
        );
        let relay = Arc::new(Relay::new(
            Arc::new(FakeApi::default()),
            Arc::clone(&connector),
            config(&["ws://a/{subject_id}"]),
        ));
        let (_rx, task) = spawn_session(relay, cancel);
        let (session, outcome) = task.await.unwrap();

        assert!(session.upstream_feed_connected);
        assert_eq!(outcome.end, EndReason::Cancelled);
        assert!(connector.feed_closed());
    }

    #[test]
    fn test_failure_transitions() {
        assert!(matches!(
            RelayState::after_feed_failure(0, 3),
            RelayState::TryingFeed(1)
        ));
        assert!(matches!(
            RelayState::after_feed_failure(2, 3),
            RelayState::Polling
        ));
    }
}
