//! Device WebSocket: periodic screen frames plus command requests.
//!
//! Server → client:
//!
//! ```json
//! {"type": "frame", "format": "jpeg", "data": "<base64>"}
//! {"type": "result", "id": 7, "action": "tap", "result": {"success": true}}
//! {"type": "error", "id": 7, "description": "..."}
//! ```
//!
//! Client → server: any device command, e.g.
//! `{"id": 7, "action": "tap", "x": 540, "y": 960}`.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use uilens_device::{DeviceAdapter, DeviceCommand};

use crate::AppState;
use crate::devices::{device, encode_frame, run_command};
use crate::error::ApiResult;

const OUTBOX_CAPACITY: usize = 16;

/// Resolve the session before upgrading so an unknown device is a plain
/// HTTP error instead of a socket that closes at once.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Response> {
    let device = device(&state, &id).await?;
    state.metrics.inc_ws_connections();
    info!(session = %id, "device websocket requested");
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, id, device, state))
        .into_response())
}

async fn handle_socket(
    socket: WebSocket,
    id: String,
    device: Arc<dyn DeviceAdapter>,
    state: Arc<AppState>,
) {
    info!(session = %id, "device websocket connected");
    let (mut sender, mut receiver) = socket.split();
    // frames and replies share one writer
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOX_CAPACITY);

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut frame_task = tokio::spawn({
        let tx = tx.clone();
        let device = device.clone();
        let state = state.clone();
        let session = id.clone();
        async move {
            let interval = Duration::from_millis(state.config.stream.frame_interval_ms.max(1));
            let quality = state.config.stream.jpeg_quality;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let frame = match device.screenshot().await {
                    Ok(img) => encode_frame(img, quality).await,
                    Err(e) => Err(e),
                };
                let msg = match frame {
                    Ok(data) => {
                        state.metrics.inc_ws_frames();
                        json!({"type": "frame", "format": "jpeg", "data": data})
                    }
                    Err(e) => {
                        warn!(session = %session, error = %e, "screen frame failed");
                        json!({"type": "error", "id": Value::Null, "description": e.to_string()})
                    }
                };
                if tx.send(msg.to_string()).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let session = id.clone();
        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        let reply = handle_request(&state, device.as_ref(), text.as_str()).await;
                        if tx.send(reply.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            debug!(session = %session, "websocket reader finished");
        }
    });

    tokio::select! {
        _ = &mut send_task => {},
        _ = &mut frame_task => {},
        _ = &mut recv_task => {},
    }
    send_task.abort();
    frame_task.abort();
    recv_task.abort();

    info!(session = %id, "device websocket disconnected");
}

/// Parse one client message and run it against the device.
async fn handle_request(state: &AppState, device: &dyn DeviceAdapter, text: &str) -> Value {
    let raw: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            return json!({"type": "error", "id": Value::Null, "description": format!("invalid JSON: {e}")});
        }
    };
    let request_id = raw.get("id").cloned().unwrap_or(Value::Null);
    let command = match serde_json::from_value::<DeviceCommand>(raw) {
        Ok(c) => c,
        Err(e) => {
            return json!({"type": "error", "id": request_id, "description": format!("invalid command: {e}")});
        }
    };

    match run_command(state, device, &command).await {
        Ok(result) => json!({
            "type": "result",
            "id": request_id,
            "action": command.name(),
            "result": result,
        }),
        Err(e) => {
            warn!(action = command.name(), error = %e, "websocket command failed");
            json!({"type": "error", "id": request_id, "description": e.to_string()})
        }
    }
}
