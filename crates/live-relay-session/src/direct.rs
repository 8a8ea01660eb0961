//! Direct feed relaying.

use live_relay_core::{
    Downstream, DownstreamFrame, Feed, FeedFrame, RelayMessage, Session, protocol::annotate,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::relay::{EndReason, emit};

/// Relay an open feed until it ends, the client leaves, or a write fails.
///
/// The feed is closed on every exit path.
pub(crate) async fn relay_feed<D: Downstream>(
    mut feed: Box<dyn Feed>,
    session: &Session,
    downstream: &mut D,
    cancel: &CancellationToken,
) -> EndReason {
    let end = relay_frames(&mut *feed, session, downstream, cancel).await;
    feed.close().await;
    end
}

async fn relay_frames<D: Downstream>(
    feed: &mut dyn Feed,
    session: &Session,
    downstream: &mut D,
    cancel: &CancellationToken,
) -> EndReason {
    let start = session.broadcast_start.as_deref();

    if let Some(start) = start {
        let announce = RelayMessage::BroadcastStart {
            broadcast_start: start.to_string(),
        };
        if let Err(end) = emit(downstream, cancel, announce).await {
            return end;
        }
    }

    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => return EndReason::Cancelled,
            frame = feed.next_frame() => frame,
        };

        let out = match frame {
            None => {
                tracing::info!("Feed closed");
                return EndReason::FeedEnded;
            }
            Some(Err(e)) => {
                tracing::warn!("Feed lost: {e}");
                return EndReason::FeedLost(e.to_string());
            }
            Some(Ok(FeedFrame::Text(text))) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => DownstreamFrame::Raw(annotate(value, start)),
                Err(e) => {
                    tracing::warn!("Dropping non-JSON feed message ({e}): {text}");
                    continue;
                }
            },
            Some(Ok(FeedFrame::Binary(data))) => DownstreamFrame::Binary(data),
        };

        if let Err(end) = emit(downstream, cancel, out).await {
            return end;
        }
        tracing::trace!("Forwarded feed message");
    }
}
