//! Error types for the request pipeline and the persistence façade.
//!
//! # Design
//! `NetworkError` is a closed taxonomy. Decode failures are flattened to one
//! variant whatever their structural cause, and transport failures other than
//! lost connectivity pass through untouched in `Transport`.
//! `PersistenceError` carries fixed descriptions only; the store-level cause is
//! logged where the error is produced.

use crate::transport::TransportError;

pub const DEFAULT_ERROR_MESSAGE: &str = "default.error.message";
pub const DEFAULT_CONNECTION_ERROR_MESSAGE: &str = "default.connection.error.message";
pub const DECODING_ERROR_MESSAGE: &str = "decoding error";

/// Errors returned by `RequestPipeline`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// No URL was supplied, or it could not be parsed.
    #[error("invalid URL")]
    InvalidUrl,

    /// The transport finished without an HTTP response.
    #[error("no response")]
    NoResponse,

    /// A body (payload or error envelope) did not decode.
    #[error("{0}")]
    Decode(String),

    /// Non-success status with a decodable error envelope.
    #[error("server error: {0}")]
    ServerError(String),

    #[error("no internet: {0}")]
    NoInternet(String),

    #[error(transparent)]
    Transport(TransportError),
}

impl NetworkError {
    pub(crate) fn decode() -> Self {
        NetworkError::Decode(DECODING_ERROR_MESSAGE.to_string())
    }
}

impl From<TransportError> for NetworkError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::NotConnected => {
                NetworkError::NoInternet(DEFAULT_CONNECTION_ERROR_MESSAGE.to_string())
            }
            other => NetworkError::Transport(other),
        }
    }
}

/// Errors returned by `PersistenceController`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to save changes.")]
    SaveError,

    #[error("Failed to delete object.")]
    DeleteError,

    #[error("Failed to fetch objects.")]
    FetchError,

    #[error("Failed to update object.")]
    UpdateError,
}
