//! The connection hub: every live WebSocket, keyed by client id.
//!
//! Outbound traffic goes through a bounded per-connection queue drained by
//! that connection's send task, so one unresponsive peer can never block the
//! hub. A full or closed queue evicts the peer.
//!
//! Directory mutations do not push device lists themselves; they emit a
//! change signal consumed by a broadcaster task, which recomputes and fans
//! out a fresh personalized `device_list` to every connection. Two broadcasts
//! in flight may race, but each one is a full snapshot no older than the
//! mutation that triggered it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, info, warn};
use tokio::sync::{mpsc, RwLock};

use crate::directory::DeviceDirectory;
use crate::models::{Device, DeviceMode};
use crate::ws::ServerMessage;

/// Size of the per-connection outbound queue.
const CONNECTION_BUFFER_SIZE: usize = 64;

#[derive(Clone)]
struct ConnectionHandle {
    /// Serial of the registration that produced this handle. A replaced
    /// (orphaned) connection keeps its old serial, so its eventual disconnect
    /// cannot evict the replacement.
    conn_id: u64,
    tx: mpsc::Sender<ServerMessage>,
}

pub struct Hub {
    connections: RwLock<HashMap<String, ConnectionHandle>>,
    pub directory: DeviceDirectory,
    changed_tx: mpsc::UnboundedSender<()>,
    next_conn_id: AtomicU64,
}

impl Hub {
    /// Creates a hub and spawns its broadcaster task. The task holds only a
    /// weak reference and exits when the last `Arc<Hub>` is dropped.
    pub fn new() -> Arc<Self> {
        let (changed_tx, changed_rx) = mpsc::unbounded_channel();
        let hub = Arc::new(Self {
            connections: RwLock::new(HashMap::new()),
            directory: DeviceDirectory::new(),
            changed_tx,
            next_conn_id: AtomicU64::new(0),
        });
        tokio::spawn(run_broadcaster(Arc::downgrade(&hub), changed_rx));
        hub
    }

    /// Accepts a connection for `client_id`, overwriting any previous entry
    /// under the same id (last register wins; the old socket is orphaned, not
    /// closed). Queues the current device list for the new client and returns
    /// the registration serial plus the receiver its send task must drain.
    pub async fn register_connection(
        &self,
        client_id: &str,
    ) -> (u64, mpsc::Receiver<ServerMessage>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER_SIZE);

        let replaced = self.connections.write().await.insert(
            client_id.to_string(),
            ConnectionHandle {
                conn_id,
                tx: tx.clone(),
            },
        );
        if replaced.is_some() {
            warn!("client {client_id} reconnected; orphaning its previous connection");
        }
        info!("client {client_id} connected (conn {conn_id})");

        // fresh channel, cannot be full
        let devices = self.directory.list_excluding(client_id).await;
        let _ = tx.try_send(ServerMessage::DeviceList { devices });

        (conn_id, rx)
    }

    /// Removes the connection and its directory entry. Idempotent, and a
    /// no-op when `conn_id` does not match the live registration (the caller
    /// was an orphaned connection). Only schedules a broadcast when a device
    /// record was actually removed, so a client that never registered
    /// disconnects silently.
    pub async fn unregister(&self, client_id: &str, conn_id: u64) {
        {
            let mut connections = self.connections.write().await;
            match connections.get(client_id) {
                Some(handle) if handle.conn_id == conn_id => {
                    connections.remove(client_id);
                    info!("client {client_id} disconnected (conn {conn_id})");
                }
                _ => return,
            }
        }
        if self.directory.remove(client_id).await {
            self.notify_changed();
        }
    }

    /// Best-effort targeted send. Returns false when the client is not
    /// connected or its queue is full/closed; the latter evicts the client,
    /// so a dead connection heals itself out of the registry.
    pub async fn send_to(&self, client_id: &str, message: ServerMessage) -> bool {
        let handle = self.connections.read().await.get(client_id).cloned();
        let Some(handle) = handle else {
            debug!("dropping message for {client_id}: not connected");
            return false;
        };
        match handle.tx.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                warn!("evicting {client_id}: outbound queue unavailable ({e})");
                self.unregister(client_id, handle.conn_id).await;
                false
            }
        }
    }

    /// Sends to every connection not in `exclude`. A failed peer is evicted
    /// and the loop continues; one dead connection never aborts the fan-out.
    pub async fn broadcast(&self, message: ServerMessage, exclude: &[&str]) {
        let snapshot: Vec<(String, ConnectionHandle)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        for (client_id, handle) in snapshot {
            if exclude.contains(&client_id.as_str()) {
                continue;
            }
            if let Err(e) = handle.tx.try_send(message.clone()) {
                warn!("evicting {client_id} during broadcast ({e})");
                self.unregister(&client_id, handle.conn_id).await;
            }
        }
    }

    /// Pushes a personalized `device_list` (self excluded) to every
    /// connection. Full push, not a diff.
    pub async fn broadcast_device_list(&self) {
        let snapshot: Vec<(String, ConnectionHandle)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        debug!("broadcasting device list to {} clients", snapshot.len());

        for (client_id, handle) in snapshot {
            let devices = self.directory.list_excluding(&client_id).await;
            if let Err(e) = handle.tx.try_send(ServerMessage::DeviceList { devices }) {
                warn!("evicting {client_id} during device list broadcast ({e})");
                self.unregister(&client_id, handle.conn_id).await;
            }
        }
    }

    pub async fn send_device_list(&self, client_id: &str) -> bool {
        let devices = self.directory.list_excluding(client_id).await;
        self.send_to(client_id, ServerMessage::DeviceList { devices })
            .await
    }

    /// Upserts the client's directory entry and schedules a broadcast.
    pub async fn register_device(&self, device: Device) {
        info!("registered device: {device:?}");
        self.directory.upsert(device).await;
        self.notify_changed();
    }

    /// Updates the client's mode; never creates an entry, and only schedules
    /// a broadcast when something changed.
    pub async fn update_mode(&self, client_id: &str, mode: DeviceMode) {
        if self.directory.update_mode(client_id, mode).await {
            self.notify_changed();
        }
    }

    pub async fn notify_transfer_progress(
        &self,
        client_id: &str,
        transfer_id: &str,
        progress: f64,
    ) -> bool {
        self.send_to(
            client_id,
            ServerMessage::TransferProgress {
                transfer_id: transfer_id.to_string(),
                progress,
            },
        )
        .await
    }

    pub async fn is_connected(&self, client_id: &str) -> bool {
        self.connections.read().await.contains_key(client_id)
    }

    fn notify_changed(&self) {
        // the broadcaster may already be gone during shutdown
        let _ = self.changed_tx.send(());
    }
}

async fn run_broadcaster(hub: Weak<Hub>, mut changed_rx: mpsc::UnboundedReceiver<()>) {
    while changed_rx.recv().await.is_some() {
        // coalesce a burst of mutations into one fan-out
        while changed_rx.try_recv().is_ok() {}
        let Some(hub) = hub.upgrade() else { break };
        hub.broadcast_device_list().await;
    }
    debug!("broadcaster stopped");
}
