//! WebSocket relay sessions.

use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use live_relay_core::{ChannelDownstream, DownstreamFrame, Session};
use tracing::Instrument;
use uuid::Uuid;

use crate::AppState;

/// Frames queued for one client before the relay waits on the writer.
const DOWNSTREAM_BUFFER: usize = 256;

/// WebSocket upgrade handler for `/ws/monitor/{subject_id}/{channel_id}`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((subject_id, channel_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let session_id = Uuid::new_v4();
        let span = tracing::info_span!("relay", %session_id, %subject_id, %channel_id);
        handle_socket(socket, state, Session::new(subject_id, channel_id)).instrument(span)
    })
}

async fn handle_socket(socket: WebSocket, state: AppState, mut session: Session) {
    tracing::info!("Client connected");
    let (mut sender, mut receiver) = socket.split();
    let (mut downstream, mut rx) = ChannelDownstream::channel(DOWNSTREAM_BUFFER);
    let cancel = state.shutdown.child_token();

    // Forward relay frames to the client; closes the socket once the relay is done
    let send_task = tokio::spawn(
        async move {
            while let Some(frame) = rx.recv().await {
                let Some(msg) = into_message(frame) else {
                    continue;
                };
                if sender.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = sender.close().await;
        }
        .in_current_span(),
    );

    // Client input is ignored; only a disconnect matters
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("WebSocket receive error: {e}");
                        break;
                    }
                }
            }
            tracing::info!("Client disconnected");
            cancel.cancel();
        }
        .in_current_span()
    });

    let outcome = state.relay.run(&mut session, &mut downstream, &cancel).await;

    watcher.abort();
    drop(downstream);
    let _ = send_task.await;
    tracing::info!(path = ?outcome.path, end = ?outcome.end, "Session closed");
}

fn into_message(frame: DownstreamFrame) -> Option<Message> {
    if let DownstreamFrame::Binary(data) = frame {
        return Some(Message::Binary(data.into()));
    }
    match frame.to_json() {
        Ok(json) => json.map(|json| Message::Text(json.into())),
        Err(e) => {
            tracing::error!("Failed to serialize frame: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use live_relay_core::RelayMessage;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_into_message() {
        let msg = into_message(RelayMessage::error("boom").into()).unwrap();
        let Message::Text(text) = msg else {
            panic!("expected text, got {msg:?}");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value, json!({ "type": "error", "message": "boom" }));

        let msg = into_message(DownstreamFrame::Raw(json!({ "a": 1 }))).unwrap();
        assert!(matches!(msg, Message::Text(ref t) if t.as_str() == r#"{"a":1}"#));

        let msg = into_message(DownstreamFrame::Binary(vec![1, 2])).unwrap();
        assert!(matches!(msg, Message::Binary(ref b) if b.as_ref() == [1, 2]));
    }
}
