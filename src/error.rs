use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum DropError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Transfer not found")]
    TransferNotFound,

    #[error("Transfer already exists")]
    TransferExists,

    #[error("Transfer is already {0}")]
    InvalidTransition(&'static str),

    #[error("Device not found")]
    DeviceNotFound,

    #[error("No uploaded files for this transfer")]
    TransferFilesNotFound,

    #[error("Path escapes the transfer directory")]
    PathOutsideTransfer,

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Error: could not get $HOME value")]
    NoHomeDir,

    #[error("Could not serialize config")]
    ConfigSerializationFail(#[from] toml::ser::Error),

    #[error("Could not parse config file")]
    ConfigParseError(#[from] Box<figment::Error>),
}

pub type Result<T> = std::result::Result<T, DropError>;

impl IntoResponse for DropError {
    fn into_response(self) -> Response {
        let status = match &self {
            DropError::TransferNotFound
            | DropError::DeviceNotFound
            | DropError::TransferFilesNotFound => StatusCode::NOT_FOUND,
            DropError::TransferExists | DropError::InvalidTransition(_) => StatusCode::CONFLICT,
            DropError::Malformed(_) => StatusCode::BAD_REQUEST,
            DropError::PathOutsideTransfer => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
