//! Error types for the relay protocol library.
//!
//! This module defines error types for framing failures, object decoding
//! failures, and authentication negotiation failures.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
///
/// The relay wire format has no resynchronization marker, so every variant
/// here is fatal for the connection that produced it: callers must close
/// the connection rather than skip the message and continue.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error in a string object.
    #[error("decode error: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// The payload ended before a complete object could be read.
    #[error("truncated message: needed {needed} more bytes, {have} available")]
    Truncated {
        /// Bytes still required by the current object.
        needed: usize,
        /// Bytes remaining in the payload.
        have: usize,
    },

    /// Unknown 3-character object type tag.
    #[error("unknown object type tag: {0:?}")]
    UnknownType(String),

    /// Unknown compression flag byte in a frame header.
    #[error("unknown compression flag: {0:#04x}")]
    UnknownCompression(u8),

    /// Zlib inflation of a compressed frame failed.
    #[error("decompression failed: {0}")]
    Compression(String),

    /// A frame declared a length larger than the configured limit.
    #[error("frame too long: {actual} bytes (limit: {limit})")]
    FrameTooLong {
        /// Declared frame length.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// A frame declared a length smaller than its own header.
    #[error("frame too short: declared {0} bytes")]
    FrameTooShort(usize),

    /// Two hashtable keys stringified to the same value.
    ///
    /// Collisions are surfaced to the caller instead of silently
    /// overwriting the earlier entry.
    #[error("hashtable key collision: {0}")]
    KeyCollision(String),

    /// A length-prefixed number contained non-numeric bytes.
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),
}

/// Errors from the password handshake negotiation.
///
/// These are fatal and non-retryable, distinct from transient transport
/// failures: retrying with the same credentials cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The relay requires TOTP, which this client does not support.
    #[error("relay requires TOTP, which is not supported")]
    TotpUnsupported,

    /// The relay chose a hash algorithm this client did not advertise.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The relay chose a nonce-based algorithm but sent no nonce.
    #[error("handshake reply missing server nonce")]
    MissingNonce,

    /// The relay requested zero PBKDF2 iterations.
    #[error("invalid iteration count: {0}")]
    InvalidIterations(u32),

    /// A nonce contained non-hexadecimal characters.
    #[error("invalid hex in nonce: {0:?}")]
    InvalidHex(String),
}

/// Errors from command batch bracketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BatchError {
    /// `begin` was called while a batch was already open.
    #[error("command batch already open")]
    Nested,

    /// `push` or `end` was called without an open batch.
    #[error("no command batch open")]
    NotOpen,
}
