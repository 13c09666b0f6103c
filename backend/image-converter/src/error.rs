/// Error types for the image converter
///
/// Every failure of an invocation is one of these variants. Errors carry the
/// bucket/key (or pipeline stage) they occurred on and are converted to HTTP
/// responses at the invocation boundary.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::time::Duration;

use crate::services::conversion::Stage;

/// Result type for image-converter operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Invocation error taxonomy
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Envelope was malformed or missing required fields
    #[error("Failed to decode event: {0}")]
    Decode(String),

    /// Required deployment setting is absent
    #[error("Missing configuration: {0} is not set")]
    ConfigMissing(&'static str),

    /// Object store could not be reached or authenticated
    #[error("Failed to connect to object store to {operation} gs://{bucket}/{key}: {reason}")]
    StorageConnect {
        operation: &'static str,
        bucket: String,
        key: String,
        reason: String,
    },

    /// Source object is absent or the read failed
    #[error("Failed to read gs://{bucket}/{key}: {reason}")]
    StorageRead {
        bucket: String,
        key: String,
        reason: String,
    },

    /// Source bytes are not a valid image of the expected format
    #[error("Failed to decode webp gs://{bucket}/{key}: {reason}")]
    DecodeImage {
        bucket: String,
        key: String,
        reason: String,
    },

    /// Destination write failed or was not finalized
    #[error("Failed to write gs://{bucket}/{key}: {reason}")]
    StorageWrite {
        bucket: String,
        key: String,
        reason: String,
    },

    /// Encoder failed internally
    #[error("Failed to encode jpeg for gs://{bucket}/{key}: {reason}")]
    EncodeImage {
        bucket: String,
        key: String,
        reason: String,
    },

    /// Invocation deadline fired while a stage was in flight
    #[error("Deadline of {after:?} exceeded while {stage}")]
    Deadline { stage: Stage, after: Duration },
}

impl ConvertError {
    /// Stable, machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::Decode(_) => "decode_error",
            ConvertError::ConfigMissing(_) => "config_missing_error",
            ConvertError::StorageConnect { .. } => "storage_connect_error",
            ConvertError::StorageRead { .. } => "storage_read_error",
            ConvertError::DecodeImage { .. } => "decode_image_error",
            ConvertError::StorageWrite { .. } => "storage_write_error",
            ConvertError::EncodeImage { .. } => "encode_image_error",
            ConvertError::Deadline { .. } => "deadline_error",
        }
    }
}

/// JSON body returned for a failed invocation
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    pub status: u16,
}

impl ResponseError for ConvertError {
    fn status_code(&self) -> StatusCode {
        match self {
            ConvertError::Decode(_) => StatusCode::BAD_REQUEST,
            ConvertError::Deadline { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorResponse {
            error: self.kind(),
            message: self.to_string(),
            status: status.as_u16(),
        })
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::Decode(err.to_string())
    }
}
