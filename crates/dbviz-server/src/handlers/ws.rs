//! WebSocket transport adapter.
//!
//! One connection is one session. Inbound text frames go to the session
//! manager; outbound frames are drained from the session's channel and
//! written as JSON text frames. The session is closed when the socket is.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::schema::{ErrorPayload, ServerMessage};
use crate::state::AppState;

/// `GET /ws`
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve(socket, state))
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!("failed to encode outbound frame: {}", err);
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn serve(mut socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = state.sessions.open(tx).await.id();

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                let frame = match inbound {
                    Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                    Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        tracing::debug!("session {}: socket error: {}", id, err);
                        break;
                    }
                };
                if let Err(err) = state.sessions.dispatch(id, &frame).await {
                    let message = ServerMessage::Error(ErrorPayload::from(&err));
                    if !send(&mut socket, &message).await {
                        break;
                    }
                    if matches!(err, SessionError::NoSession(_)) {
                        break;
                    }
                }
            }
            Some(outbound) = rx.recv() => {
                if !send(&mut socket, &outbound).await {
                    tracing::warn!("session {}: failed to deliver frame, closing", id);
                    break;
                }
            }
        }
    }

    state.sessions.close(id).await;
}
