//! Unified error handling for the relay client core.
//!
//! Errors are layered: protocol and transport failures are fatal for the
//! connection that produced them, authentication failures are fatal and
//! non-retryable, and reconciliation anomalies never surface as errors
//! at all (they are silently dropped by the handlers).

use thiserror::Error;
use weerelay_proto::{AuthError, ProtocolError};

use crate::transport::TransportError;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RelayError {
    /// Wire format violation; the connection must be closed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connect, TLS, WebSocket, or socket I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication negotiation failure; retrying cannot succeed.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The connection dropped after being established.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// An operation was attempted without a live connection.
    #[error("not connected")]
    NotConnected,

    /// Configuration could not be loaded or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether the caller may retry after a backoff.
    ///
    /// Authentication failures are permanent; everything else is a
    /// candidate for the caller-driven reconnect policy.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Auth(_) | Self::Config(_))
    }
}
