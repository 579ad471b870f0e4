pub mod devices;
pub mod files;
pub mod transfers;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::MAX_BODY_BYTES;
use crate::ws::ws_handler;
use crate::DropService;

pub fn router(service: DropService) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/devices", get(devices::list_devices))
        .route("/api/devices/receivers", get(devices::list_receivers))
        .route("/api/devices/:device_id", get(devices::get_device))
        .route("/api/files/upload", post(files::upload_file))
        .route("/api/files/upload-multiple", post(files::upload_multiple))
        .route("/api/files/list", get(files::list_files))
        .route("/api/files/download/:transfer_id", get(files::download_listing))
        .route(
            "/api/files/download/:transfer_id/*file_path",
            get(files::download_file),
        )
        .route("/api/transfers/initiate", post(transfers::initiate_transfer))
        .route(
            "/api/transfers/:transfer_id",
            get(transfers::get_transfer).delete(transfers::delete_transfer),
        )
        .route(
            "/api/transfers/:transfer_id/accept",
            post(transfers::accept_transfer),
        )
        .route(
            "/api/transfers/:transfer_id/reject",
            post(transfers::reject_transfer),
        )
        .route("/ws/:client_id", get(ws_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        // the browser frontend is served from another origin on the LAN
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
