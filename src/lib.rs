//! landrop: a coordination server for LAN peer-to-peer file drops.
//!
//! Devices hold a WebSocket open to `/ws/{client_id}`, declare themselves
//! with a `register` message, and see every other connected device through
//! broadcast `device_list` snapshots. Transfer negotiation (request, accept,
//! reject) runs over the same signaling channel or over REST; file bytes
//! move separately through the upload/download endpoints, keyed by transfer
//! id.

pub mod api;
pub mod cleanup;
pub mod config;
pub mod directory;
pub mod error;
pub mod hub;
pub mod models;
pub mod storage;
pub mod transfer;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::hub::Hub;
use crate::storage::Storage;
use crate::transfer::TransferStore;

/// Everything a handler needs, cloned into each connection. Each service is
/// its own isolated world; tests spin up as many as they like.
#[derive(Clone)]
pub struct DropService {
    pub config: Config,
    pub hub: Arc<Hub>,
    pub transfers: Arc<TransferStore>,
    pub storage: Storage,
}

impl DropService {
    pub fn new(config: Config) -> Self {
        let storage = Storage::new(&config.upload_dir);
        Self {
            config,
            hub: Hub::new(),
            transfers: Arc::new(TransferStore::new()),
            storage,
        }
    }

    /// Binds and serves until the process dies. Also spawns the stale
    /// transfer cleanup task.
    pub async fn start(&self) -> crate::error::Result<()> {
        self.storage.ensure_root().await?;
        log::info!("upload directory: {:?}", self.storage.root());

        tokio::spawn(cleanup::run(
            self.storage.clone(),
            self.config.auto_cleanup_hours,
        ));

        let app = api::router(self.clone());
        let addr = SocketAddr::from((self.config.host, self.config.port));
        let listener = TcpListener::bind(&addr).await?;
        log::info!("landrop listening on {addr}");

        axum::serve(listener, app).await?;
        Ok(())
    }
}
