//! Realtime WebSocket endpoint.
//!
//! Each socket is one queue connection. Outbound events come from the queue's
//! per-connection sink; inbound text frames are parsed as [`ClientMessage`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use vexport_models::{ClientMessage, ConnectionId, ServerMessage};

use crate::metrics;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

/// Lower bound on the ping interval; tokio intervals reject zero.
const MIN_PING_INTERVAL: Duration = Duration::from_millis(100);

/// WebSocket endpoint.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection();

    let max_message = state.config.ws_max_message_bytes;
    ws.max_message_size(max_message)
        .max_frame_size(max_message)
        .on_upgrade(|socket| async move {
            handle_socket(socket, state).await;
            let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
            metrics::set_ws_active_connections(count);
        })
}

/// Run one connection until the client leaves, goes silent, or a send fails.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (connection_id, mut events) = state.queue.register().await;
    info!(connection_id = %connection_id, "WebSocket connected");

    let ping_interval = state.config.ws_ping_interval.max(MIN_PING_INTERVAL);
    let idle_timeout = state.config.ws_idle_timeout;
    let mut heartbeat =
        tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(message) = event else { break };
                if !send_message(&mut sender, &message).await {
                    debug!(connection_id = %connection_id, "Send failed, client gone");
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        handle_text(&state, &connection_id, &text).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        last_seen = Instant::now();
                        metrics::record_ws_message_received("binary");
                        state
                            .queue
                            .send_to(&connection_id, ServerMessage::error("Binary frames are not supported"))
                            .await;
                    }
                    // Pings are answered by the transport
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(connection_id = %connection_id, "Client closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(connection_id = %connection_id, "WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > idle_timeout {
                    warn!(connection_id = %connection_id, "Connection idle, closing");
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    warn!(connection_id = %connection_id, "Heartbeat failed, client disconnected");
                    break;
                }
            }
        }
    }

    state.queue.unregister(&connection_id).await;
    let _ = sender.close().await;
    info!(connection_id = %connection_id, "WebSocket disconnected");
}

/// Handle one inbound text frame. Problems are reported to the sender only.
async fn handle_text(state: &AppState, connection_id: &ConnectionId, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::SubmitJob { inputs, parameters }) => {
            metrics::record_ws_message_received("submit_job");
            if let Err(e) = state.queue.submit(connection_id, inputs, parameters).await {
                debug!(connection_id = %connection_id, reason = %e, "Submission rejected");
            }
        }
        Err(e) => {
            metrics::record_ws_message_received("invalid");
            state
                .queue
                .send_to(connection_id, ServerMessage::error(format!("Invalid message: {}", e)))
                .await;
        }
    }
}

async fn send_message(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize {}: {}", message.message_type().as_str(), e);
            return true;
        }
    };
    metrics::record_ws_message_sent(message.message_type().as_str());
    sender.send(Message::Text(json)).await.is_ok()
}
