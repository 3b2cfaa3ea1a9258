//! Shared error type across syncroom crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed configuration.
    BadRequest,
    /// Credential missing or rejected.
    AuthFailed,
    /// Envelope could not be decoded.
    DecodeFailed,
    /// Frame exceeds the configured limit.
    PayloadTooLarge,
    /// Transport read/write failure or deadline expiry.
    Transport,
    /// Outbound mailbox saturated.
    Backpressure,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::AuthFailed => "AUTH_FAILED",
            ClientCode::DecodeFailed => "DECODE_FAILED",
            ClientCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ClientCode::Transport => "TRANSPORT",
            ClientCode::Backpressure => "BACKPRESSURE",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, SyncRoomError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum SyncRoomError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("auth failed")]
    AuthFailed,
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("transport: {0}")]
    Transport(String),
    #[error("outbound mailbox full")]
    Backpressure,
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl SyncRoomError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            SyncRoomError::BadRequest(_) => ClientCode::BadRequest,
            SyncRoomError::AuthFailed => ClientCode::AuthFailed,
            SyncRoomError::Decode(_) => ClientCode::DecodeFailed,
            SyncRoomError::PayloadTooLarge => ClientCode::PayloadTooLarge,
            SyncRoomError::Transport(_) => ClientCode::Transport,
            SyncRoomError::Backpressure => ClientCode::Backpressure,
            SyncRoomError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            SyncRoomError::Internal(_) => ClientCode::Internal,
        }
    }
}
