//! Read-only REST view of the device directory.

use axum::extract::{Path, State};
use axum::Json;

use crate::error::{DropError, Result};
use crate::models::{Device, DeviceMode};
use crate::DropService;

/// GET /api/devices
pub async fn list_devices(State(service): State<DropService>) -> Json<Vec<Device>> {
    Json(service.hub.directory.list().await)
}

/// GET /api/devices/receivers
pub async fn list_receivers(State(service): State<DropService>) -> Json<Vec<Device>> {
    Json(service.hub.directory.list_by_mode(DeviceMode::Receive).await)
}

/// GET /api/devices/{device_id}
pub async fn get_device(
    Path(device_id): Path<String>,
    State(service): State<DropService>,
) -> Result<Json<Device>> {
    service
        .hub
        .directory
        .get(&device_id)
        .await
        .map(Json)
        .ok_or(DropError::DeviceNotFound)
}
