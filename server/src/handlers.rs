use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use sketchrelay_shared::ClientMessage;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::canvas_id::validate_canvas_id;
use crate::client::{ClientPhase, Frame};
use crate::config::RelayMode;
use crate::error::ApiError;
use crate::hub::Hub;
use crate::state::AppState;

const WRITE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

pub async fn create_canvas_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let canvas_id = state.hub.create_generated_canvas().await?;
    Ok(Json(json!({ "canvasID": canvas_id })))
}

pub async fn canvas_info_handler(
    Path(canvas_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    validate_canvas_id(&canvas_id)?;
    let stats = state
        .hub
        .canvas_stats(&canvas_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("canvas {canvas_id} not found")))?;
    Ok(Json(json!({
        "canvasID": canvas_id,
        "clients": stats.clients,
        "strokes": stats.strokes,
    })))
}

pub async fn ws_handler(
    Path(canvas_id): Path<String>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> impl IntoResponse {
    if let Err(error) = validate_canvas_id(&canvas_id) {
        tracing::debug!(canvas = %canvas_id, %error, "websocket rejected");
        return (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, canvas_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, canvas_id: String) {
    let mut phase = ClientPhase::Connecting;
    let client_id = Uuid::new_v4().to_string();

    let session = match state.hub.add_client(&canvas_id, client_id.clone()).await {
        Ok(session) => session,
        Err(error) => {
            tracing::warn!(canvas = %canvas_id, %error, "failed to register client");
            transition(&mut phase, ClientPhase::Detached, &canvas_id, &client_id);
            return;
        }
    };
    transition(&mut phase, ClientPhase::Registered, &canvas_id, &client_id);
    tracing::info!(
        canvas = %canvas_id,
        client = %client_id,
        replayed = session.replayed,
        "client connected"
    );

    let (socket_sender, socket_receiver) = socket.split();
    let mut send_task = tokio::spawn(write_loop(socket_sender, session.outbox));
    let mut recv_task = tokio::spawn(read_loop(
        socket_receiver,
        state.hub.clone(),
        state.relay_mode,
        canvas_id.clone(),
        client_id.clone(),
    ));
    transition(&mut phase, ClientPhase::Active, &canvas_id, &client_id);

    let mut write_finished = false;
    tokio::select! {
        _ = &mut send_task => {
            write_finished = true;
            recv_task.abort();
        }
        result = &mut recv_task => {
            if let Ok(Some(frame)) = result {
                tracing::debug!(
                    canvas = %canvas_id,
                    client = %client_id,
                    code = frame.code,
                    reason = %frame.reason,
                    "close frame received"
                );
            }
        }
    }

    // Dropping the registry's handle closes the outbox, which lets the
    // write loop flush what is left and exit.
    state.hub.remove_client(&canvas_id, &client_id).await;
    transition(&mut phase, ClientPhase::Detached, &canvas_id, &client_id);

    if !write_finished && tokio::time::timeout(WRITE_DRAIN_TIMEOUT, &mut send_task).await.is_err() {
        send_task.abort();
    }
    let canvases = state.hub.canvas_count().await;
    tracing::info!(
        canvas = %canvas_id,
        client = %client_id,
        canvases = canvases,
        "client disconnected"
    );
}

fn transition(phase: &mut ClientPhase, next: ClientPhase, canvas_id: &str, client_id: &str) {
    let previous = *phase;
    if phase.advance_to(next) {
        tracing::debug!(
            canvas = canvas_id,
            client = client_id,
            from = ?previous,
            to = ?next,
            "client phase changed"
        );
    }
}

async fn write_loop(
    mut socket_sender: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<Frame>,
) {
    while let Some(frame) = outbox.recv().await {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.to_string()),
            Frame::Binary(data) => Message::Binary(data.to_vec()),
        };
        if let Err(error) = socket_sender.send(message).await {
            tracing::debug!(%error, "websocket write failed");
            return;
        }
    }
    let _ = socket_sender.close().await;
}

/// Runs until the peer closes or the transport fails. Returns the peer's
/// close frame, if one was sent.
async fn read_loop(
    mut socket_receiver: SplitStream<WebSocket>,
    hub: Arc<Hub>,
    relay_mode: RelayMode,
    canvas_id: String,
    client_id: String,
) -> Option<CloseFrame<'static>> {
    while let Some(result) = socket_receiver.next().await {
        let message = match result {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!(canvas = %canvas_id, client = %client_id, %error, "websocket read failed");
                return None;
            }
        };
        match (relay_mode, message) {
            (_, Message::Close(frame)) => return frame,
            (RelayMode::Raw, Message::Text(text)) => {
                hub.broadcast_raw(&canvas_id, Some(&client_id), Frame::Text(Arc::from(text)))
                    .await;
            }
            (RelayMode::Raw, Message::Binary(data)) => {
                hub.broadcast_raw(&canvas_id, Some(&client_id), Frame::Binary(Arc::from(data)))
                    .await;
            }
            (RelayMode::Stroke, Message::Text(text)) => {
                handle_client_message(&hub, &canvas_id, &client_id, ClientMessage::decode_text(&text))
                    .await;
            }
            (RelayMode::Stroke, Message::Binary(data)) => {
                handle_client_message(&hub, &canvas_id, &client_id, ClientMessage::decode_binary(&data))
                    .await;
            }
            _ => {}
        }
    }
    None
}

async fn handle_client_message(
    hub: &Hub,
    canvas_id: &str,
    client_id: &str,
    message: Option<ClientMessage>,
) {
    match message {
        Some(ClientMessage::Stroke { stroke }) => {
            let delivery = hub.broadcast_stroke(canvas_id, Some(client_id), stroke).await;
            if delivery.dropped > 0 {
                tracing::debug!(
                    canvas = canvas_id,
                    client = client_id,
                    delivered = delivery.delivered,
                    dropped = delivery.dropped,
                    "stroke not delivered to every peer"
                );
            }
        }
        None => {
            tracing::trace!(canvas = canvas_id, client = client_id, "ignored inbound frame");
        }
    }
}
