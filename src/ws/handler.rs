//! The signaling endpoint: one WebSocket per client, a send task draining
//! the hub's per-connection queue, and a dispatcher routing each inbound
//! frame to exactly one operation.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};

use super::types::{ClientMessage, ServerMessage};
use crate::models::Device;
use crate::DropService;

/// GET /ws/{client_id}
///
/// The client id is caller-chosen and not validated for uniqueness; a second
/// connection under the same id wins and orphans the first.
pub async fn ws_handler(
    Path(client_id): Path<String>,
    State(service): State<DropService>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, service, client_id))
}

async fn handle_socket(socket: WebSocket, service: DropService, client_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut outbound_rx) = service.hub.register_connection(&client_id).await;

    let send_client_id = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!("could not serialize outbound message for {send_client_id}: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => dispatch(&service, &client_id, message).await,
                // a bad frame from one client must never take down its loop,
                // and no reply channel is defined for malformed input
                Err(e) => debug!("ignoring malformed frame from {client_id}: {e}"),
            },
            Ok(Message::Close(_)) => {
                debug!("client {client_id} closed its connection");
                break;
            }
            Ok(_) => {} // binary frames and ws-level ping/pong: nothing to do
            Err(e) => {
                debug!("websocket error for {client_id}: {e}");
                break;
            }
        }
    }

    send_task.abort();
    service.hub.unregister(&client_id, conn_id).await;
}

async fn dispatch(service: &DropService, client_id: &str, message: ClientMessage) {
    let hub = &service.hub;
    match message {
        ClientMessage::Register {
            name,
            device_type,
            mode,
            avatar_id,
        } => {
            hub.register_device(Device {
                id: client_id.to_string(),
                name,
                device_type,
                mode,
                avatar_id,
            })
            .await;
        }

        ClientMessage::UpdateMode { mode } => {
            hub.update_mode(client_id, mode).await;
        }

        ClientMessage::SendRequest { target_id, files } => {
            // pure relay; no transfer record is created on this path
            let from_name = hub.directory.name_of(client_id).await;
            hub.send_to(
                &target_id,
                ServerMessage::TransferRequest {
                    transfer_id: None,
                    from: client_id.to_string(),
                    from_name: Some(from_name),
                    files,
                },
            )
            .await;
        }

        ClientMessage::AcceptTransfer {
            sender_id,
            transfer_id,
        } => {
            hub.send_to(
                &sender_id,
                ServerMessage::TransferAccepted {
                    transfer_id,
                    from: Some(client_id.to_string()),
                    receiver_id: None,
                },
            )
            .await;
        }

        ClientMessage::RejectTransfer { sender_id } => {
            hub.send_to(
                &sender_id,
                ServerMessage::TransferRejected {
                    transfer_id: None,
                    from: Some(client_id.to_string()),
                },
            )
            .await;
        }

        ClientMessage::Ping => {
            hub.send_to(client_id, ServerMessage::Pong).await;
        }

        ClientMessage::Unknown => {
            debug!("ignoring unknown message type from {client_id}");
        }
    }
}
