//! Live job progress over WebSocket.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};

use crate::state::AppState;

/// GET /ws/:job_id
pub async fn job_events(
    ws: WebSocketUpgrade,
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, job_id))
}

/// Forwards job events as JSON text frames and answers `ping` with `pong`.
///
/// The socket is closed once the job's channel ends, which happens right
/// after its terminal event.
async fn handle_socket(socket: WebSocket, state: AppState, job_id: String) {
    let mut subscription = state.service.subscribe(&job_id);
    let connection = subscription.id();
    tracing::info!(job_id = %job_id, %connection, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(%connection, "Failed to encode event: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) if text.trim() == "ping" => {
                    if sender.send(Message::Text("pong".to_string())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.service.notifier().unsubscribe(connection);
    tracing::info!(job_id = %job_id, %connection, "WebSocket disconnected");
}
