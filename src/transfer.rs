//! The transfer negotiation state machine.
//!
//! A transfer moves `pending -> accepted` or `pending -> rejected` and then
//! stops; re-negotiating requires a fresh transfer id. Records are created
//! either explicitly by initiate (files already on disk) or lazily by the
//! first upload under an unknown id. Nothing here touches the disk and
//! nothing here talks to peers; delivery of the resulting notifications is
//! the caller's job, through the hub.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::{DropError, Result};
use crate::models::{FileMetadata, Transfer, TransferStatus};

#[derive(Default)]
pub struct TransferStore {
    transfers: RwLock<HashMap<String, Transfer>>,
}

impl TransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pending transfer. Duplicate ids are a caller error: random
    /// id generation should not collide, so a collision is rejected rather
    /// than merged.
    pub async fn initiate(
        &self,
        transfer_id: &str,
        sender_id: &str,
        receiver_id: &str,
        files: Vec<FileMetadata>,
    ) -> Result<Transfer> {
        let total_size = files.iter().map(|f| f.size).sum();
        let mut transfers = self.transfers.write().await;
        if transfers.contains_key(transfer_id) {
            return Err(DropError::TransferExists);
        }
        let transfer = Transfer {
            id: transfer_id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: Some(receiver_id.to_string()),
            files,
            status: TransferStatus::Pending,
            total_size,
            uploaded_size: 0,
        };
        transfers.insert(transfer_id.to_string(), transfer.clone());
        Ok(transfer)
    }

    /// Marks the transfer accepted and returns the updated record. The caller
    /// is trusted to be the transfer's receiver; no identity check is made.
    pub async fn accept(&self, transfer_id: &str) -> Result<Transfer> {
        self.transition(transfer_id, TransferStatus::Accepted).await
    }

    pub async fn reject(&self, transfer_id: &str) -> Result<Transfer> {
        self.transition(transfer_id, TransferStatus::Rejected).await
    }

    async fn transition(&self, transfer_id: &str, to: TransferStatus) -> Result<Transfer> {
        let mut transfers = self.transfers.write().await;
        let transfer = transfers
            .get_mut(transfer_id)
            .ok_or(DropError::TransferNotFound)?;
        if transfer.status != TransferStatus::Pending {
            return Err(DropError::InvalidTransition(transfer.status.as_str()));
        }
        transfer.status = to;
        Ok(transfer.clone())
    }

    /// Appends an uploaded file to the transfer, growing both size counters.
    /// Unknown ids create a pending record with no declared receiver; this is
    /// the upload-first flow, where initiate arrives after the bytes.
    pub async fn record_upload(&self, meta: FileMetadata) -> Transfer {
        let mut transfers = self.transfers.write().await;
        let transfer = transfers
            .entry(meta.transfer_id.clone())
            .or_insert_with(|| Transfer {
                id: meta.transfer_id.clone(),
                sender_id: meta.uploaded_by.clone(),
                receiver_id: None,
                files: Vec::new(),
                status: TransferStatus::Pending,
                total_size: 0,
                uploaded_size: 0,
            });
        transfer.total_size += meta.size;
        transfer.uploaded_size += meta.size;
        transfer.files.push(meta);
        transfer.clone()
    }

    /// Every recorded file across every transfer, in no particular order.
    pub async fn list_files(&self) -> Vec<FileMetadata> {
        self.transfers
            .read()
            .await
            .values()
            .flat_map(|t| t.files.iter().cloned())
            .collect()
    }

    pub async fn get(&self, transfer_id: &str) -> Result<Transfer> {
        self.transfers
            .read()
            .await
            .get(transfer_id)
            .cloned()
            .ok_or(DropError::TransferNotFound)
    }

    /// Removes the in-memory record; idempotent. On-disk files are the
    /// storage collaborator's job, cleaned up alongside.
    pub async fn delete(&self, transfer_id: &str) {
        self.transfers.write().await.remove(transfer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(transfer_id: &str, name: &str, size: u64) -> FileMetadata {
        FileMetadata {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            size,
            file_type: "application/octet-stream".to_string(),
            relative_path: None,
            uploaded_by: "sender".to_string(),
            transfer_id: transfer_id.to_string(),
        }
    }

    #[tokio::test]
    async fn initiate_rejects_duplicate_ids() {
        let store = TransferStore::new();
        store.initiate("t1", "a", "b", vec![]).await.unwrap();
        let err = store.initiate("t1", "a", "b", vec![]).await.unwrap_err();
        assert!(matches!(err, DropError::TransferExists));
    }

    #[tokio::test]
    async fn initiate_sums_total_size() {
        let store = TransferStore::new();
        let files = vec![meta("t1", "a.txt", 10), meta("t1", "b.txt", 32)];
        let transfer = store.initiate("t1", "a", "b", files).await.unwrap();
        assert_eq!(transfer.total_size, 42);
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(transfer.receiver_id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn accept_is_terminal() {
        let store = TransferStore::new();
        store.initiate("t1", "a", "b", vec![]).await.unwrap();

        let transfer = store.accept("t1").await.unwrap();
        assert_eq!(transfer.status, TransferStatus::Accepted);

        // a second accept or a late reject must not change the status
        assert!(matches!(
            store.accept("t1").await.unwrap_err(),
            DropError::InvalidTransition("accepted")
        ));
        assert!(matches!(
            store.reject("t1").await.unwrap_err(),
            DropError::InvalidTransition("accepted")
        ));
        assert_eq!(
            store.get("t1").await.unwrap().status,
            TransferStatus::Accepted
        );
    }

    #[tokio::test]
    async fn reject_unknown_id_is_not_found() {
        let store = TransferStore::new();
        assert!(matches!(
            store.reject("nope").await.unwrap_err(),
            DropError::TransferNotFound
        ));
    }

    #[tokio::test]
    async fn record_upload_creates_lazily_without_receiver() {
        let store = TransferStore::new();
        let transfer = store.record_upload(meta("t9", "x.bin", 100)).await;
        assert_eq!(transfer.sender_id, "sender");
        assert!(transfer.receiver_id.is_none());
        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(transfer.files.len(), 1);
    }

    #[tokio::test]
    async fn record_upload_total_is_order_independent() {
        let forward = TransferStore::new();
        forward.record_upload(meta("t1", "a", 10)).await;
        let t_forward = forward.record_upload(meta("t1", "b", 20)).await;

        let backward = TransferStore::new();
        backward.record_upload(meta("t1", "b", 20)).await;
        let t_backward = backward.record_upload(meta("t1", "a", 10)).await;

        assert_eq!(t_forward.total_size, t_backward.total_size);
        assert_eq!(t_forward.uploaded_size, 30);
    }

    #[tokio::test]
    async fn list_files_flattens_across_transfers() {
        let store = TransferStore::new();
        store
            .initiate("t1", "a", "b", vec![meta("t1", "one.txt", 1)])
            .await
            .unwrap();
        store.record_upload(meta("t2", "two.txt", 2)).await;

        let mut names: Vec<String> = store
            .list_files()
            .await
            .into_iter()
            .map(|f| f.name)
            .collect();
        names.sort();
        assert_eq!(names, ["one.txt", "two.txt"]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = TransferStore::new();
        store.initiate("t1", "a", "b", vec![]).await.unwrap();
        store.delete("t1").await;
        store.delete("t1").await;
        assert!(matches!(
            store.get("t1").await.unwrap_err(),
            DropError::TransferNotFound
        ));
    }
}
