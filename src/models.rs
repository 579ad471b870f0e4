use serde::{Deserialize, Serialize};

/// What a device is currently doing. Advisory only: a device in `Home` can
/// still be handed a transfer request.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceMode {
    #[default]
    Home,
    Send,
    Receive,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    Mobile,
    #[default]
    Desktop,
    Tablet,
}

/// One entry in the device directory. Exists exactly as long as its owning
/// WebSocket connection is open and has sent a `register` message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub mode: DeviceMode,
    pub avatar_id: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Accepted => "accepted",
            TransferStatus::Rejected => "rejected",
        }
    }
}

/// A negotiated (or in-progress) transfer. `receiver_id` is absent for
/// transfers created implicitly by the upload-first flow, where the receiver
/// is only declared at initiate time.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    pub sender_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    pub files: Vec<FileMetadata>,
    pub status: TransferStatus,
    pub total_size: u64,
    pub uploaded_size: u64,
}

/// Metadata recorded for every uploaded file.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    pub uploaded_by: String,
    pub transfer_id: String,
}

/// The lightweight file listing carried inside signaling messages and
/// download listings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
}
