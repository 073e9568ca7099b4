//! API error type and its HTTP mapping.

use aquaguard_connectors::ConnectorError;
use aquaguard_core::{DatasetError, TelemetryError};
use serde_json::{json, Value};
use thiserror::Error;

use crate::history::HistoryError;

/// Errors surfaced to API clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request was malformed
    #[error("{0}")]
    BadRequest(String),

    /// Resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Method not supported on this path
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    /// Server-side failure
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code for the error
    pub fn status(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::Internal(_) => 500,
        }
    }

    /// `{ "message": ... }` body
    pub fn body(&self) -> Value {
        json!({ "message": self.to_string() })
    }
}

/// Failures while assembling the server
#[derive(Debug, Error)]
pub enum StartupError {
    /// Datasets could not be loaded
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// History file could not be opened
    #[error(transparent)]
    History(#[from] HistoryError),

    /// A model client could not be built
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Async runtime could not start
    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// Listen address unavailable
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

impl From<TelemetryError> for ApiError {
    fn from(e: TelemetryError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<DatasetError> for ApiError {
    fn from(e: DatasetError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<HistoryError> for ApiError {
    fn from(e: HistoryError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", e))
    }
}
