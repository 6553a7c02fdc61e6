//! The injected HTTP client.
//!
//! The pipeline never opens sockets. It hands a fully built `HttpRequest` to an
//! `HttpTransport` and classifies whatever comes back. Cancellation is
//! expressed by dropping the returned future.

use async_trait::async_trait;

use crate::http::{HttpRequest, HttpResponse};

/// Executes one HTTP exchange.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` and wait for the exchange to finish.
    ///
    /// Returns `Ok(None)` when the exchange completed without producing an
    /// HTTP response (for instance a non-HTTP URL scheme).
    async fn send(&self, request: HttpRequest) -> Result<Option<HttpResponse>, TransportError>;
}

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The device has no network connectivity.
    #[error("not connected to the internet")]
    NotConnected,

    #[error("request timed out")]
    TimedOut,

    #[error("request cancelled")]
    Cancelled,

    /// Anything else the client reports; passed through unclassified.
    #[error("{0}")]
    Other(String),
}

/// Transport for hosts that run the exchange themselves and only call
/// `build_request` and `parse_response`. Every dispatch fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

#[async_trait]
impl HttpTransport for Detached {
    async fn send(&self, _request: HttpRequest) -> Result<Option<HttpResponse>, TransportError> {
        Err(TransportError::Other("no transport attached".to_string()))
    }
}
