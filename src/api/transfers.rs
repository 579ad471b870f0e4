//! Transfer negotiation over REST. These handlers and the signaling relay
//! share the one transfer store, so a transfer initiated here can be
//! accepted from either surface.

use axum::extract::{Path, State};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{FileMetadata, Transfer};
use crate::ws::ServerMessage;
use crate::DropService;

#[derive(Debug, Deserialize)]
pub struct InitiateParams {
    pub sender_id: String,
    pub receiver_id: String,
    pub transfer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptParams {
    pub receiver_id: String,
}

impl DropService {
    /// Builds a pending transfer from the files already uploaded under
    /// `transfer_id` and offers it to the receiver over signaling. The offer
    /// is best-effort: an offline receiver leaves the transfer in place for
    /// later polling.
    pub async fn initiate_transfer(
        &self,
        sender_id: &str,
        receiver_id: &str,
        transfer_id: &str,
    ) -> Result<Transfer> {
        let items = self.storage.scan(transfer_id).await?;
        let files = items
            .iter()
            .map(|item| FileMetadata {
                id: Uuid::new_v4().to_string(),
                name: item.name.clone(),
                size: item.size,
                file_type: item
                    .file_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                relative_path: item.path.clone(),
                uploaded_by: sender_id.to_string(),
                transfer_id: transfer_id.to_string(),
            })
            .collect();

        let transfer = self
            .transfers
            .initiate(transfer_id, sender_id, receiver_id, files)
            .await?;

        self.hub
            .send_to(
                receiver_id,
                ServerMessage::TransferRequest {
                    transfer_id: Some(transfer_id.to_string()),
                    from: sender_id.to_string(),
                    from_name: None,
                    files: items,
                },
            )
            .await;

        Ok(transfer)
    }

    pub async fn accept_transfer(&self, transfer_id: &str, receiver_id: &str) -> Result<Transfer> {
        let transfer = self.transfers.accept(transfer_id).await?;
        self.hub
            .send_to(
                &transfer.sender_id,
                ServerMessage::TransferAccepted {
                    transfer_id: transfer_id.to_string(),
                    from: None,
                    receiver_id: Some(receiver_id.to_string()),
                },
            )
            .await;
        Ok(transfer)
    }

    pub async fn reject_transfer(&self, transfer_id: &str) -> Result<Transfer> {
        let transfer = self.transfers.reject(transfer_id).await?;
        self.hub
            .send_to(
                &transfer.sender_id,
                ServerMessage::TransferRejected {
                    transfer_id: Some(transfer_id.to_string()),
                    from: None,
                },
            )
            .await;
        Ok(transfer)
    }
}

/// POST /api/transfers/initiate
pub async fn initiate_transfer(
    State(service): State<DropService>,
    Form(params): Form<InitiateParams>,
) -> Result<Json<Value>> {
    let transfer = service
        .initiate_transfer(&params.sender_id, &params.receiver_id, &params.transfer_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "transferId": transfer.id,
        "message": "Transfer initiated",
    })))
}

/// POST /api/transfers/{transfer_id}/accept
///
/// The caller is not checked against the transfer's declared receiver; any
/// party that knows the id can accept on the receiver's behalf.
pub async fn accept_transfer(
    Path(transfer_id): Path<String>,
    State(service): State<DropService>,
    Form(params): Form<AcceptParams>,
) -> Result<Json<Value>> {
    service
        .accept_transfer(&transfer_id, &params.receiver_id)
        .await?;
    Ok(Json(json!({"success": true, "message": "Transfer accepted"})))
}

/// POST /api/transfers/{transfer_id}/reject
pub async fn reject_transfer(
    Path(transfer_id): Path<String>,
    State(service): State<DropService>,
) -> Result<Json<Value>> {
    service.reject_transfer(&transfer_id).await?;
    Ok(Json(json!({"success": true, "message": "Transfer rejected"})))
}

/// GET /api/transfers/{transfer_id}
pub async fn get_transfer(
    Path(transfer_id): Path<String>,
    State(service): State<DropService>,
) -> Result<Json<Transfer>> {
    Ok(Json(service.transfers.get(&transfer_id).await?))
}

/// DELETE /api/transfers/{transfer_id}
pub async fn delete_transfer(
    Path(transfer_id): Path<String>,
    State(service): State<DropService>,
) -> Result<Json<Value>> {
    service.storage.delete(&transfer_id).await?;
    service.transfers.delete(&transfer_id).await;
    Ok(Json(json!({"success": true, "message": "Transfer deleted"})))
}
