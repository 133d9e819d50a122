// docbridge-core/src/error.rs
use thiserror::Error;

/// Errors returned by docbridge operations.
///
/// Driver failures are carried through untouched in [`DocBridgeError::Driver`],
/// so callers can still inspect `mongodb::error::ErrorKind`.
#[derive(Error, Debug)]
pub enum DocBridgeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] mongodb::bson::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] mongodb::bson::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DocBridgeError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DocBridgeError::InvalidArgument(msg.into())
    }

    /// True when the error originated inside the MongoDB driver.
    pub fn is_driver(&self) -> bool {
        matches!(self, DocBridgeError::Driver(_))
    }
}

pub type Result<T> = std::result::Result<T, DocBridgeError>;
