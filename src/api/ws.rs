//! Draft event stream.
//!
//! Read-only: clients receive a `drafts_sync` snapshot on connect and then
//! every draft event. Actions go through the REST endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::AppState;
use crate::drafts::{DraftEvent, DraftQueue};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket client connecting");
    let queue = state.workflow.queue().clone();
    ws.on_upgrade(move |socket| handle_socket(socket, queue))
}

async fn send_event(socket: &mut WebSocket, event: &DraftEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to encode draft event");
            true
        }
    }
}

async fn sync(socket: &mut WebSocket, queue: &DraftQueue) -> bool {
    let drafts = queue.list().await;
    send_event(socket, &DraftEvent::DraftsSync { drafts }).await
}

async fn handle_socket(mut socket: WebSocket, queue: Arc<DraftQueue>) {
    // Subscribe before the snapshot so nothing created in between is missed.
    let mut rx = queue.subscribe();

    if !sync(&mut socket, &queue).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }
    info!("WebSocket client connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind broadcast");
                        if !sync(&mut socket, &queue).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(len = text.len(), "Ignoring client message");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}
