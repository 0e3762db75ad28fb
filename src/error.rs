//! Error types for the inventory service
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Inventory Error Enum ==
/// Unified error type for the record store, image pipeline, bulk transfer
/// and cache controller.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Bytes could not be decoded as an image
    #[error("Image decode failed: {0}")]
    Decode(String),

    /// Underlying file or upload stream could not be read
    #[error("Read failed: {0}")]
    Read(String),

    /// Update or lookup on a record id that does not exist
    #[error("Record not found: {0}")]
    NotFound(i64),

    /// Persistent storage fault
    #[error("Storage error: {0}")]
    Storage(String),

    /// Interchange document could not be parsed
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Cache generation could not be installed or activated
    #[error("Install failed: {0}")]
    Install(String),

    /// Network fetch failed and no cached fallback exists
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InventoryError {
    /// Stable name of the failure kind, carried in `operation-failed`
    /// notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            InventoryError::Decode(_) => "decode_error",
            InventoryError::Read(_) => "read_error",
            InventoryError::NotFound(_) => "not_found",
            InventoryError::Storage(_) => "storage_error",
            InventoryError::MalformedDocument(_) => "malformed_document",
            InventoryError::Install(_) => "install_error",
            InventoryError::Network(_) => "network_error",
            InventoryError::InvalidRequest(_) => "invalid_request",
            InventoryError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            InventoryError::NotFound(_) => StatusCode::NOT_FOUND,
            InventoryError::Decode(_)
            | InventoryError::InvalidRequest(_)
            | InventoryError::MalformedDocument(_) => StatusCode::BAD_REQUEST,
            InventoryError::Read(_) => StatusCode::UNPROCESSABLE_ENTITY,
            InventoryError::Network(_) => StatusCode::BAD_GATEWAY,
            InventoryError::Install(_) => StatusCode::SERVICE_UNAVAILABLE,
            InventoryError::Storage(_) | InventoryError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for InventoryError {
    fn from(err: sqlx::Error) -> Self {
        InventoryError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for InventoryError {
    fn from(err: serde_json::Error) -> Self {
        InventoryError::MalformedDocument(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the inventory service.
pub type Result<T> = std::result::Result<T, InventoryError>;
