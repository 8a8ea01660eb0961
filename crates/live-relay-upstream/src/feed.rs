//! Direct feed over `tokio-tungstenite` with keepalive probes.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use live_relay_core::{
    Feed, FeedConnector, FeedFrame,
    traits::FeedError,
};
use tokio::{
    net::TcpStream,
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header},
    },
};

use crate::config::{FeedConfig, USER_AGENT};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens direct feeds with browser-like handshake headers.
#[derive(Debug, Clone, Default)]
pub struct WsFeedConnector {
    config: FeedConfig,
}

impl WsFeedConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new(config: FeedConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FeedConnector for WsFeedConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Feed>, FeedError> {
        let connect_err = |reason: String| FeedError::Connect {
            endpoint: endpoint.to_string(),
            reason,
        };

        let mut request = endpoint
            .into_client_request()
            .map_err(|e| connect_err(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::ORIGIN,
            HeaderValue::from_str(&self.config.origin).map_err(|e| connect_err(e.to_string()))?,
        );

        let (stream, _) = tokio::time::timeout(self.config.connect_timeout, connect_async(request))
            .await
            .map_err(|_| FeedError::ConnectTimeout(endpoint.to_string()))?
            .map_err(|e| connect_err(e.to_string()))?;

        Ok(Box::new(WsFeed::new(
            stream,
            self.config.ping_interval,
            self.config.ping_timeout,
        )))
    }
}

/// An open feed connection.
///
/// A ping goes out every `ping_interval`; if its pong has not arrived within
/// `ping_timeout` the feed ends with [`FeedError::KeepaliveTimeout`]. Any
/// inbound traffic clears the outstanding ping.
struct WsFeed {
    stream: WsStream,
    pings: Interval,
    ping_timeout: Duration,
    awaiting_pong_since: Option<Instant>,
    closed: bool,
}

impl WsFeed {
    fn new(stream: WsStream, ping_interval: Duration, ping_timeout: Duration) -> Self {
        let mut pings = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
        pings.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            stream,
            pings,
            ping_timeout,
            awaiting_pong_since: None,
            closed: false,
        }
    }
}

#[async_trait]
impl Feed for WsFeed {
    async fn next_frame(&mut self) -> Option<Result<FeedFrame, FeedError>> {
        if self.closed {
            return None;
        }

        loop {
            let deadline = self.awaiting_pong_since.map(|sent| sent + self.ping_timeout);
            let pong_overdue = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                msg = self.stream.next() => {
                    let msg = match msg {
                        None => {
                            self.closed = true;
                            return None;
                        }
                        Some(Err(e)) => {
                            self.closed = true;
                            return Some(Err(FeedError::Transport(e.to_string())));
                        }
                        Some(Ok(msg)) => msg,
                    };
                    self.awaiting_pong_since = None;

                    match msg {
                        Message::Text(text) => return Some(Ok(FeedFrame::Text(text.to_string()))),
                        Message::Binary(data) => return Some(Ok(FeedFrame::Binary(data.to_vec()))),
                        Message::Close(frame) => {
                            tracing::debug!(?frame, "feed closed by peer");
                            self.closed = true;
                            return None;
                        }
                        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                    }
                }
                _ = self.pings.tick(), if self.awaiting_pong_since.is_none() => {
                    if let Err(e) = self.stream.send(Message::Ping(Vec::new().into())).await {
                        self.closed = true;
                        return Some(Err(FeedError::Transport(e.to_string())));
                    }
                    self.awaiting_pong_since = Some(Instant::now());
                }
                () = pong_overdue => {
                    self.closed = true;
                    return Some(Err(FeedError::KeepaliveTimeout(self.ping_timeout)));
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("Feed close failed: {e}");
        }
    }
}
