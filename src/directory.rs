//! The device directory: what each connected client has declared about itself.
//!
//! The directory is mutated only in response to messages routed through the
//! connection hub, so an entry exists exactly for the clients that are both
//! connected and registered.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::models::{Device, DeviceMode};

#[derive(Default)]
pub struct DeviceDirectory {
    devices: RwLock<HashMap<String, Device>>,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces (not merges) the record for `client_id`.
    pub async fn upsert(&self, device: Device) {
        self.devices
            .write()
            .await
            .insert(device.id.clone(), device);
    }

    /// Updates the mode of an existing record. Returns false (and never
    /// creates a record) when the client has not registered.
    pub async fn update_mode(&self, client_id: &str, mode: DeviceMode) -> bool {
        match self.devices.write().await.get_mut(client_id) {
            Some(device) => {
                let old = device.mode;
                device.mode = mode;
                log::debug!("mode updated for {client_id}: {old:?} -> {mode:?}");
                true
            }
            None => false,
        }
    }

    /// Removes the record if present. Returns whether anything was removed.
    pub async fn remove(&self, client_id: &str) -> bool {
        self.devices.write().await.remove(client_id).is_some()
    }

    pub async fn get(&self, client_id: &str) -> Option<Device> {
        self.devices.read().await.get(client_id).cloned()
    }

    pub async fn name_of(&self, client_id: &str) -> String {
        self.get(client_id)
            .await
            .map(|d| d.name)
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Snapshot of every device except the given client, used to build each
    /// recipient's personalized view.
    pub async fn list_excluding(&self, client_id: &str) -> Vec<Device> {
        self.devices
            .read()
            .await
            .values()
            .filter(|d| d.id != client_id)
            .cloned()
            .collect()
    }

    pub async fn list(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn list_by_mode(&self, mode: DeviceMode) -> Vec<Device> {
        self.devices
            .read()
            .await
            .values()
            .filter(|d| d.mode == mode)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceType;

    fn device(id: &str, mode: DeviceMode) -> Device {
        Device {
            id: id.to_string(),
            name: format!("{id}-device"),
            device_type: DeviceType::Desktop,
            mode,
            avatar_id: 0,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_the_whole_record() {
        let dir = DeviceDirectory::new();
        dir.upsert(device("a", DeviceMode::Send)).await;
        dir.upsert(device("a", DeviceMode::Receive)).await;

        let got = dir.get("a").await.unwrap();
        assert_eq!(got.mode, DeviceMode::Receive);
        assert_eq!(dir.list().await.len(), 1);
    }

    #[tokio::test]
    async fn update_mode_never_creates_a_record() {
        let dir = DeviceDirectory::new();
        assert!(!dir.update_mode("ghost", DeviceMode::Send).await);
        assert!(dir.get("ghost").await.is_none());

        dir.upsert(device("a", DeviceMode::Home)).await;
        assert!(dir.update_mode("a", DeviceMode::Send).await);
        assert_eq!(dir.get("a").await.unwrap().mode, DeviceMode::Send);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = DeviceDirectory::new();
        dir.upsert(device("a", DeviceMode::Home)).await;
        assert!(dir.remove("a").await);
        assert!(!dir.remove("a").await);
    }

    #[tokio::test]
    async fn list_excluding_never_contains_self() {
        let dir = DeviceDirectory::new();
        dir.upsert(device("a", DeviceMode::Receive)).await;
        dir.upsert(device("b", DeviceMode::Send)).await;

        let seen_by_b = dir.list_excluding("b").await;
        assert_eq!(seen_by_b.len(), 1);
        assert_eq!(seen_by_b[0].id, "a");
    }

    #[tokio::test]
    async fn list_by_mode_filters() {
        let dir = DeviceDirectory::new();
        dir.upsert(device("a", DeviceMode::Receive)).await;
        dir.upsert(device("b", DeviceMode::Send)).await;
        dir.upsert(device("c", DeviceMode::Receive)).await;

        let receivers = dir.list_by_mode(DeviceMode::Receive).await;
        assert_eq!(receivers.len(), 2);
        assert!(receivers.iter().all(|d| d.mode == DeviceMode::Receive));
    }
}
