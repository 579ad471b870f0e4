//! Wire types for the signaling channel.
//!
//! Every frame is a JSON object tagged by `type`, with camelCase fields.
//! Unknown inbound types deserialize to [`ClientMessage::Unknown`] and are
//! dropped by the dispatcher instead of surfacing an error to the sender.

use serde::{Deserialize, Serialize};

use crate::models::{Device, DeviceMode, DeviceType, FileItem};

/// Messages a client sends over its WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Declare (or re-declare) this device's directory entry.
    Register {
        #[serde(default = "default_name")]
        name: String,
        #[serde(default)]
        device_type: DeviceType,
        #[serde(default)]
        mode: DeviceMode,
        #[serde(default)]
        avatar_id: u32,
    },

    UpdateMode {
        #[serde(default)]
        mode: DeviceMode,
    },

    /// Peer-to-peer transfer offer, relayed directly to the target without
    /// creating a transfer record.
    SendRequest {
        target_id: String,
        #[serde(default)]
        files: Vec<FileItem>,
    },

    AcceptTransfer {
        sender_id: String,
        transfer_id: String,
    },

    RejectTransfer {
        sender_id: String,
    },

    /// Liveness probe; answered with `pong`, no state change.
    Ping,

    #[serde(other)]
    Unknown,
}

fn default_name() -> String {
    "Unknown".to_string()
}

/// Messages the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Full snapshot of every device except the recipient's own entry.
    DeviceList { devices: Vec<Device> },

    TransferRequest {
        #[serde(skip_serializing_if = "Option::is_none")]
        transfer_id: Option<String>,
        from: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_name: Option<String>,
        files: Vec<FileItem>,
    },

    TransferAccepted {
        transfer_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        receiver_id: Option<String>,
    },

    TransferRejected {
        #[serde(skip_serializing_if = "Option::is_none")]
        transfer_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },

    TransferProgress {
        transfer_id: String,
        progress: f64,
    },

    Pong,
}
