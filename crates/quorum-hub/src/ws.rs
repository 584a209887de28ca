//! WebSocket enrollment sessions.
//!
//! Each connection gets a read loop and a write loop. The read loop forwards
//! every text frame to the hub; the write loop drains the session's bounded
//! outbound queue. Whichever ends first ends the session, and the session is
//! always unregistered on the way out.
//!
//! ```text
//!   participant ──text frame──▶ read loop ──Submit──▶ Hub
//!   participant ◀──Output────── write loop ◀──queue── Hub
//! ```

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::hub::{HubHandle, Outbound, SessionId, OUTBOUND_QUEUE_CAPACITY};

/// Path participants connect to.
pub const ENROLL_PATH: &str = "/ws/enroll";

/// Upgrade handler for [`ENROLL_PATH`].
pub async fn ws_enroll_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| run_session(socket, hub))
}

async fn run_session(socket: WebSocket, hub: HubHandle) {
    let id = SessionId::next();
    let (sink, stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

    if let Err(e) = hub.register(id, outbound_tx).await {
        warn!(session = %id, error = %e, "Could not register session");
        let mut sink = sink;
        let _ = sink.send(Message::Close(None)).await;
        return;
    }
    info!(session = %id, "Participant connected");

    let mut writer = tokio::spawn(write_loop(id, sink, outbound_rx));
    let mut reader = tokio::spawn(read_loop(id, stream, hub.clone()));

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => {}
    }

    // The hub may already have dropped the session; either way it is gone.
    let _ = hub.unregister(id).await;
    debug!(session = %id, "Session ended");
}

async fn read_loop(id: SessionId, mut stream: SplitStream<WebSocket>, hub: HubHandle) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!(session = %id, "Ignoring non UTF-8 binary frame");
                    continue;
                }
            },
            Ok(Message::Close(_)) => {
                debug!(session = %id, "Participant closed the channel");
                return;
            }
            Ok(_) => continue,
            Err(e) => {
                debug!(session = %id, error = %e, "Read failed");
                return;
            }
        };

        if hub.submit(id, text).await.is_err() {
            return;
        }
    }
}

async fn write_loop(
    id: SessionId,
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    while let Some(message) = outbound.recv().await {
        match message {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(session = %id, error = %e, "Write failed");
                    return;
                }
            }
            Outbound::Close { code, reason } => {
                debug!(session = %id, code, %reason, "Closing session");
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })))
                    .await;
                return;
            }
        }
    }

    // Queue closed by the hub: the session is finished.
    let _ = sink.send(Message::Close(None)).await;
}
