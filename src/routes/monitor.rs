//! # routes::monitor
//!
//! `GET /ws/monitor` — real-time EngineEvent stream
//!
//! ทุก EngineEvent ถูกส่งเป็น JSON text frame.  Frame แรกเป็น `SNAPSHOT`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::atomic::Ordering;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::state::SharedState;

pub async fn ws_monitor(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let mut rx = state.events.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 Monitor client connected");

    let snapshot = json!({
        "event":              "SNAPSHOT",
        "tick_count":         state.tick_count.load(Ordering::Relaxed),
        "subscribers":        state.publisher.subscriber_count(),
        "alert_monitor":      state.alert_monitor.is_running(),
        "order_orchestrator": state.orchestrator.is_running(),
    })
    .to_string();

    if sender.send(Message::Text(snapshot)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(json_str) => {
                        if sender.send(Message::Text(json_str)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // client อ่านช้า — แจ้งให้รู้ว่าหลุดไปกี่ event
                        debug!(skipped, "Monitor client lagged");
                        let notice = json!({ "event": "LAGGED", "skipped": skipped }).to_string();
                        if sender.send(Message::Text(notice)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            result = receiver.next() => {
                match result {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("🔌 Monitor client disconnected");
}
