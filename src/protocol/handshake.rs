//! Handshake wire formats.
//!
//! The client opens TCP and sends `HANDSHAKE_FROM_CLIENT`:
//!
//! ```text
//! [header(11)] [LatencyMode(1)] [Version(1)] [LocalUDPPort(2)] [Name(2 x len)]
//! ```
//!
//! The server answers with `HANDSHAKE_FROM_SERVER`:
//!
//! ```text
//! [header(11)] [ServerVersion(1)] [ResultCode(1)]
//! ```
//!
//! The exchange itself (connect, bounded wait, state transitions) lives in
//! [`session`](crate::protocol::session); this module only builds and parses bytes.

use crate::config::{HEADER_LEN, PROTOCOL_VERSION};
use crate::core::packet::{encode, ControlType, Packet};
use crate::error::{ProtocolError, Result};
use bytes::Bytes;
use std::fmt;

/// Smallest acceptable server handshake: header plus version and result bytes.
pub const SERVER_HELLO_LEN: usize = HEADER_LEN + 2;

/// Latency management mode requested by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum LatencyMode {
    #[default]
    None = 0x00,
}

/// Encode a client name as two bytes per name byte: `[byte >> 8, byte & 0xFF]`.
///
/// Bytes are 8 bits wide, so the high byte is always zero. Servers expect this
/// layout; do not switch it to UTF-16.
pub fn encode_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() * 2);
    for byte in name.bytes() {
        let unit = u16::from(byte);
        out.push((unit >> 8) as u8);
        out.push((unit & 0xFF) as u8);
    }
    out
}

/// Build the `HANDSHAKE_FROM_CLIENT` packet.
pub fn client_hello(name: &str, local_udp_port: u16, now_ms: u64) -> Result<Bytes> {
    let mut payload = Vec::with_capacity(4 + name.len() * 2);
    payload.push(LatencyMode::None as u8);
    payload.push(PROTOCOL_VERSION);
    payload.extend_from_slice(&local_udp_port.to_be_bytes());
    payload.extend_from_slice(&encode_name(name));
    encode(ControlType::HandshakeFromClient.id(), &payload, now_ms)
}

/// Result code carried in the server's handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeResult {
    Okay,
    InvalidName,
    IncompatibleVersions,
    ConnectionFailed,
    Unknown(u8),
}

impl HandshakeResult {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => HandshakeResult::Okay,
            0x01 => HandshakeResult::InvalidName,
            0x02 => HandshakeResult::IncompatibleVersions,
            0x03 => HandshakeResult::ConnectionFailed,
            other => HandshakeResult::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            HandshakeResult::Okay => 0x00,
            HandshakeResult::InvalidName => 0x01,
            HandshakeResult::IncompatibleVersions => 0x02,
            HandshakeResult::ConnectionFailed => 0x03,
            HandshakeResult::Unknown(code) => code,
        }
    }

    pub fn is_okay(self) -> bool {
        self == HandshakeResult::Okay
    }
}

impl fmt::Display for HandshakeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeResult::Okay => f.write_str("OKAY"),
            HandshakeResult::InvalidName => f.write_str("INVALID_NAME"),
            HandshakeResult::IncompatibleVersions => f.write_str("INCOMPATIBLE_VERSIONS"),
            HandshakeResult::ConnectionFailed => f.write_str("CONNECTION_FAILED"),
            HandshakeResult::Unknown(code) => write!(f, "unknown result 0x{code:02X}"),
        }
    }
}

/// Parsed `HANDSHAKE_FROM_SERVER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHello {
    pub server_version: u8,
    pub result: HandshakeResult,
}

impl ServerHello {
    /// Parse the server's response.
    ///
    /// Checks, in order: at least 13 bytes, type `0xF5`, length field equal to the
    /// bytes received. Extra payload after the result byte is ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SERVER_HELLO_LEN {
            return Err(ProtocolError::TooShort {
                actual: bytes.len(),
                minimum: SERVER_HELLO_LEN,
            });
        }

        if bytes[8] != ControlType::HandshakeFromServer.id() {
            return Err(ProtocolError::UnexpectedPacketType(bytes[8]));
        }

        let packet = Packet::validate(bytes)?;
        Ok(Self {
            server_version: packet.payload[0],
            result: HandshakeResult::from_code(packet.payload[1]),
        })
    }

    /// `Ok` for `OKAY`, otherwise `HandshakeRejected`.
    pub fn accepted(self) -> Result<Self> {
        if self.result.is_okay() {
            Ok(self)
        } else {
            Err(ProtocolError::HandshakeRejected(self.result))
        }
    }

    /// Server side of the exchange; used by test servers and tools.
    pub fn encode(&self, now_ms: u64) -> Result<Bytes> {
        encode(
            ControlType::HandshakeFromServer.id(),
            &[self.server_version, self.result.code()],
            now_ms,
        )
    }
}
