//! # Error Types
//!
//! Error handling for the Scarlet client.
//!
//! This module defines every error variant that can occur while framing packets,
//! negotiating the handshake, supervising liveness, or talking to the transports.
//!
//! ## Error Categories
//! - **Transport failures**: connect, read and write errors on either socket
//! - **Malformed packets**: undersized or length-mismatched frames
//! - **Protocol rejections**: handshake result codes other than `OKAY`
//! - **Liveness loss**: watchdog expiry or a TCP stream that went away
//!
//! None of these are fatal. The session state machine turns each of them into a
//! backoff and retries; [`ProtocolError::reconnect_delay`] says for how long.
//!
//! ## Example Usage
//! ```rust
//! use scarlet_protocol::core::packet::Packet;
//! use scarlet_protocol::error::{ErrorKind, ProtocolError};
//!
//! match Packet::validate(&[0xF0, 0x00]) {
//!     Err(e @ ProtocolError::TooShort { .. }) => assert_eq!(e.kind(), ErrorKind::MalformedPacket),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use crate::config::{INCOMPATIBLE_VERSION_BACKOFF, RECONNECT_BACKOFF};
use crate::protocol::handshake::HandshakeResult;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Send path
    pub const ERR_SEND_TOO_SHORT: &str = "Refusing to send packet shorter than the header";
    pub const ERR_NOT_CONNECTED: &str = "TCP stream is not connected";

    /// Handshake
    pub const ERR_HANDSHAKE_TIMEOUT: &str = "Did not receive handshake response";
    pub const ERR_HANDSHAKE_CLOSED: &str = "Server closed the stream during handshake";

    /// Configuration
    pub const ERR_NAME_EMPTY: &str = "Client name cannot be empty";
    pub const ERR_ADDRESS_UNRESOLVED: &str = "Server address did not resolve";
}

/// Coarse classification of a [`ProtocolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect/read/write errors. Recoverable, triggers backoff.
    TransportFailure,
    /// Undersized or length-mismatched packet. Dropped per packet.
    MalformedPacket,
    /// The server refused the handshake.
    ProtocolRejection,
    /// Watchdog expiry or TCP disconnect while connected.
    LivenessLoss,
    /// Caller or configuration mistakes.
    Usage,
}

// ProtocolError is the primary error type for all client operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Packet too short: {actual} bytes (minimum {minimum})")]
    TooShort { actual: usize, minimum: usize },

    #[error("Declared length {declared} does not match received length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Packet type 0x{0:02X} is reserved for the protocol")]
    ReservedPacketType(u8),

    #[error("Expected handshake response, got packet type 0x{0:02X}")]
    UnexpectedPacketType(u8),

    #[error("TCP connection to server failed")]
    ConnectFailed,

    #[error("TCP stream is not connected")]
    NotConnected,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Did not receive handshake response")]
    HandshakeTimeout,

    #[error("Server rejected handshake: {0}")]
    HandshakeRejected(HandshakeResult),

    #[error("Watchdog expired")]
    WatchdogExpired,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Map this error onto the recovery taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Io(_)
            | ProtocolError::ConnectFailed
            | ProtocolError::NotConnected
            | ProtocolError::HandshakeTimeout => ErrorKind::TransportFailure,
            ProtocolError::TooShort { .. }
            | ProtocolError::LengthMismatch { .. }
            | ProtocolError::UnexpectedPacketType(_) => ErrorKind::MalformedPacket,
            ProtocolError::HandshakeRejected(_) => ErrorKind::ProtocolRejection,
            ProtocolError::ConnectionClosed | ProtocolError::WatchdogExpired => {
                ErrorKind::LivenessLoss
            }
            ProtocolError::OversizedPacket(_)
            | ProtocolError::ReservedPacketType(_)
            | ProtocolError::ConfigError(_) => ErrorKind::Usage,
        }
    }

    /// How long the session waits before reconnecting after this error.
    ///
    /// Incompatible versions get the long cooldown; retrying sooner cannot succeed.
    pub fn reconnect_delay(&self) -> Duration {
        match self {
            ProtocolError::HandshakeRejected(HandshakeResult::IncompatibleVersions) => {
                INCOMPATIBLE_VERSION_BACKOFF
            }
            _ => RECONNECT_BACKOFF,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_versions_get_long_backoff() {
        let err = ProtocolError::HandshakeRejected(HandshakeResult::IncompatibleVersions);
        assert_eq!(err.reconnect_delay(), Duration::from_secs(60));
        assert_eq!(err.kind(), ErrorKind::ProtocolRejection);
    }

    #[test]
    fn test_other_failures_get_standard_backoff() {
        for err in [
            ProtocolError::ConnectFailed,
            ProtocolError::HandshakeTimeout,
            ProtocolError::HandshakeRejected(HandshakeResult::InvalidName),
            ProtocolError::HandshakeRejected(HandshakeResult::Unknown(0x7F)),
            ProtocolError::WatchdogExpired,
        ] {
            assert_eq!(err.reconnect_delay(), Duration::from_secs(5), "{err}");
        }
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ProtocolError::LengthMismatch {
                declared: 12,
                actual: 11
            }
            .kind(),
            ErrorKind::MalformedPacket
        );
        assert_eq!(ProtocolError::ConnectionClosed.kind(), ErrorKind::LivenessLoss);
        assert_eq!(
            ProtocolError::ReservedPacketType(0xF0).kind(),
            ErrorKind::Usage
        );
        assert_eq!(
            ProtocolError::from(io::Error::from(io::ErrorKind::BrokenPipe)).kind(),
            ErrorKind::TransportFailure
        );
    }
}
