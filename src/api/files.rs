//! The file storage surface: multipart uploads into per-transfer
//! directories, and listings/streams back out. Single-file uploads feed the
//! transfer store through `record_upload`; the batch endpoint only lands
//! bytes, leaving record creation to an explicit initiate.
//!
//! Upload payloads never sit in memory: each file field is streamed
//! chunk-by-chunk into a storage spool and renamed into place once the
//! transfer id is known.

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::error::{DropError, Result};
use crate::models::FileMetadata;
use crate::storage::{guess_mime, Spool, Storage};
use crate::DropService;

struct UploadPart {
    file_name: String,
    content_type: Option<String>,
    spool: Spool,
}

/// POST /api/files/upload
///
/// Multipart fields: `file`, `sender_id`, `transfer_id`, optional
/// `relative_path` for folder uploads. Records the file against the transfer
/// and pushes progress to the declared receiver when there is one.
pub async fn upload_file(
    State(service): State<DropService>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let mut part: Option<UploadPart> = None;
    let mut sender_id: Option<String> = None;
    let mut transfer_id: Option<String> = None;
    let mut relative_path: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| DropError::Malformed(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                if let Some(stale) = part.take() {
                    service.storage.discard(stale.spool).await;
                }
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field.content_type().map(|c| c.to_string());
                let spool = spool_field(&service.storage, &mut field).await?;
                part = Some(UploadPart {
                    file_name,
                    content_type,
                    spool,
                });
            }
            Some("sender_id") => sender_id = Some(read_text(field).await?),
            Some("transfer_id") => transfer_id = Some(read_text(field).await?),
            Some("relative_path") => relative_path = Some(read_text(field).await?),
            _ => {}
        }
    }

    let part = part.ok_or_else(|| DropError::Malformed("missing file field".into()))?;
    let (sender_id, transfer_id) = match (sender_id, transfer_id) {
        (Some(sender_id), Some(transfer_id)) => (sender_id, transfer_id),
        _ => {
            service.storage.discard(part.spool).await;
            return Err(DropError::Malformed(
                "missing sender_id or transfer_id".into(),
            ));
        }
    };

    let UploadPart {
        file_name,
        content_type,
        spool,
    } = part;
    let dest = relative_path.unwrap_or_else(|| file_name.clone());
    let (path, size) = service.storage.commit(spool, &transfer_id, &dest).await?;

    let meta = FileMetadata {
        id: Uuid::new_v4().to_string(),
        name: file_name.clone(),
        size,
        file_type: content_type.unwrap_or_else(|| guess_mime(&path)),
        relative_path: Some(dest),
        uploaded_by: sender_id,
        transfer_id: transfer_id.clone(),
    };
    let file_id = meta.id.clone();
    let transfer = service.transfers.record_upload(meta).await;

    if let Some(receiver_id) = &transfer.receiver_id {
        let progress = if transfer.total_size > 0 {
            transfer.uploaded_size as f64 / transfer.total_size as f64
        } else {
            0.0
        };
        service
            .hub
            .notify_transfer_progress(receiver_id, &transfer.id, progress)
            .await;
    }

    Ok(Json(json!({
        "success": true,
        "fileId": file_id,
        "transferId": transfer_id,
        "message": format!("File {file_name} uploaded successfully"),
    })))
}

/// POST /api/files/upload-multiple
///
/// Lands a batch of files under the transfer directory without touching the
/// transfer store; the sender follows up with an initiate call that scans
/// what arrived.
pub async fn upload_multiple(
    State(service): State<DropService>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let mut transfer_id: Option<String> = None;
    let mut staged: Vec<UploadPart> = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| DropError::Malformed(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("files") | Some("file") => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field.content_type().map(|c| c.to_string());
                let spool = spool_field(&service.storage, &mut field).await?;
                staged.push(UploadPart {
                    file_name,
                    content_type,
                    spool,
                });
            }
            Some("transfer_id") => transfer_id = Some(read_text(field).await?),
            _ => {}
        }
    }

    let Some(transfer_id) = transfer_id else {
        for part in staged {
            service.storage.discard(part.spool).await;
        }
        return Err(DropError::Malformed("missing transfer_id".into()));
    };

    let mut results = Vec::new();
    for part in staged {
        let UploadPart {
            file_name, spool, ..
        } = part;
        match service.storage.commit(spool, &transfer_id, &file_name).await {
            Ok(_) => results.push(json!({"name": file_name, "success": true})),
            Err(e) => {
                log::warn!("upload of {file_name} failed: {e}");
                results.push(json!({"name": file_name, "success": false, "error": e.to_string()}));
            }
        }
    }

    Ok(Json(json!({
        "success": true,
        "transferId": transfer_id,
        "files": results,
    })))
}

/// GET /api/files/list
///
/// Every recorded file across every transfer, for debugging dashboards.
pub async fn list_files(State(service): State<DropService>) -> Json<Value> {
    Json(json!({"files": service.transfers.list_files().await}))
}

/// GET /api/files/download/{transfer_id}
///
/// The listing a receiver fetches before downloading files one by one.
pub async fn download_listing(
    Path(transfer_id): Path<String>,
    State(service): State<DropService>,
) -> Result<Json<Value>> {
    let transfer = service.transfers.get(&transfer_id).await?;
    Ok(Json(json!({
        "transferId": transfer.id,
        "files": transfer.files,
        "totalSize": transfer.total_size,
        "status": transfer.status,
    })))
}

/// GET /api/files/download/{transfer_id}/{file_path..}
pub async fn download_file(
    Path((transfer_id, file_path)): Path<(String, String)>,
    State(service): State<DropService>,
) -> Result<Response> {
    let (path, size) = service.storage.locate(&transfer_id, &file_path).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    let file = tokio::fs::File::open(&path).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        body,
    )
        .into_response())
}

/// Drains a multipart field into a fresh spool.
async fn spool_field(storage: &Storage, field: &mut Field<'_>) -> Result<Spool> {
    let mut spool = storage.spool().await?;
    match fill_spool(&mut spool, field).await {
        Ok(()) => Ok(spool),
        Err(e) => {
            storage.discard(spool).await;
            Err(e)
        }
    }
}

async fn fill_spool(spool: &mut Spool, field: &mut Field<'_>) -> Result<()> {
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| DropError::Malformed(e.to_string()))?
    {
        spool.write(&chunk).await?;
    }
    Ok(())
}

async fn read_text(field: Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| DropError::Malformed(e.to_string()))
}
