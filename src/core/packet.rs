//! Packet encoding and validation.

use crate::config::{HEADER_LEN, MAX_PACKET_LEN};
use crate::error::{ProtocolError, Result};
use crate::utils::time::ticks_from_millis;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::ops::RangeInclusive;

/// Type IDs the application may not register handlers for.
pub const RESERVED_TYPES: RangeInclusive<u8> = 0xF0..=0xFF;

/// Protocol-internal packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlType {
    WatchdogFromServer = 0xF0,
    WatchdogFromClient = 0xF1,
    /// Not implemented by this client.
    BufferLengthChange = 0xF2,
    /// Not implemented by this client.
    TimeSynchronization = 0xF3,
    HandshakeFromClient = 0xF4,
    HandshakeFromServer = 0xF5,
}

impl ControlType {
    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0xF0 => Some(ControlType::WatchdogFromServer),
            0xF1 => Some(ControlType::WatchdogFromClient),
            0xF2 => Some(ControlType::BufferLengthChange),
            0xF3 => Some(ControlType::TimeSynchronization),
            0xF4 => Some(ControlType::HandshakeFromClient),
            0xF5 => Some(ControlType::HandshakeFromServer),
            _ => None,
        }
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlType::WatchdogFromServer => "WATCHDOG_FROM_SERVER",
            ControlType::WatchdogFromClient => "WATCHDOG_FROM_CLIENT",
            ControlType::BufferLengthChange => "BUFFER_LENGTH_CHANGE",
            ControlType::TimeSynchronization => "TIME_SYNCHRONIZATION",
            ControlType::HandshakeFromClient => "HANDSHAKE_FROM_CLIENT",
            ControlType::HandshakeFromServer => "HANDSHAKE_FROM_SERVER",
        };
        f.write_str(name)
    }
}

/// A validated view over received packet bytes.
///
/// Borrowed from the receive buffer; handlers that need to keep the bytes
/// copy them out with [`Packet::as_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    /// Sender's timestamp in ticks (1/10000 of a clock millisecond unit)
    pub timestamp: u64,
    pub type_id: u8,
    /// Length field from the header; always equals `as_bytes().len()`
    pub declared_len: u16,
    pub payload: &'a [u8],
    raw: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Check the header of `bytes` and return a view over it.
    ///
    /// # Errors
    /// - `TooShort` if fewer than 11 bytes were received
    /// - `LengthMismatch` if the length field disagrees with `bytes.len()`
    pub fn validate(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ProtocolError::TooShort {
                actual: bytes.len(),
                minimum: HEADER_LEN,
            });
        }

        let declared_len = u16::from_be_bytes([bytes[9], bytes[10]]);
        if usize::from(declared_len) != bytes.len() {
            return Err(ProtocolError::LengthMismatch {
                declared: usize::from(declared_len),
                actual: bytes.len(),
            });
        }

        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&bytes[..8]);

        Ok(Self {
            timestamp: u64::from_be_bytes(timestamp),
            type_id: bytes[8],
            declared_len,
            payload: &bytes[HEADER_LEN..],
            raw: bytes,
        })
    }

    /// The whole packet, header included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn control_type(&self) -> Option<ControlType> {
        ControlType::from_id(self.type_id)
    }
}

/// Build a packet stamped with `now_ms`.
///
/// # Errors
/// `OversizedPacket` if header plus payload exceeds the 16-bit length field.
pub fn encode(type_id: u8, payload: &[u8], now_ms: u64) -> Result<Bytes> {
    let total = HEADER_LEN + payload.len();
    if total > MAX_PACKET_LEN {
        return Err(ProtocolError::OversizedPacket(total));
    }

    let mut buf = BytesMut::with_capacity(total);
    buf.put_u64(ticks_from_millis(now_ms));
    buf.put_u8(type_id);
    buf.put_u16(total as u16);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header_layout() {
        let bytes = encode(0x42, &[0xAA, 0xBB], 7).expect("encode");
        assert_eq!(bytes.len(), 13);
        assert_eq!(&bytes[..8], &70_000u64.to_be_bytes());
        assert_eq!(bytes[8], 0x42);
        assert_eq!(&bytes[9..11], &[0x00, 0x0D]);
        assert_eq!(&bytes[11..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_validate_exposes_fields_without_copying() {
        let bytes = encode(0x10, b"hello", 12).expect("encode");
        let packet = Packet::validate(&bytes).expect("valid");
        assert_eq!(packet.type_id, 0x10);
        assert_eq!(packet.timestamp, 120_000);
        assert_eq!(packet.declared_len, 16);
        assert_eq!(packet.payload, b"hello");
        assert_eq!(packet.payload.as_ptr(), bytes[11..].as_ptr());
        assert_eq!(packet.as_bytes().len(), packet.len());
    }

    #[test]
    fn test_header_only_packet_is_valid() {
        let bytes = encode(ControlType::WatchdogFromClient.id(), &[], 0).expect("encode");
        let packet = Packet::validate(&bytes).expect("valid");
        assert!(packet.payload.is_empty());
        assert_eq!(packet.control_type(), Some(ControlType::WatchdogFromClient));
    }

    #[test]
    fn test_validate_rejects_short_buffers() {
        for len in 0..HEADER_LEN {
            let bytes = vec![0u8; len];
            assert!(matches!(
                Packet::validate(&bytes),
                Err(ProtocolError::TooShort { actual, minimum: 11 }) if actual == len
            ));
        }
    }

    #[test]
    fn test_validate_rejects_length_mismatch() {
        let mut bytes = encode(0x10, &[1, 2, 3], 0).expect("encode").to_vec();
        bytes.push(0xFF);
        assert!(matches!(
            Packet::validate(&bytes),
            Err(ProtocolError::LengthMismatch {
                declared: 14,
                actual: 15
            })
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PACKET_LEN - HEADER_LEN + 1];
        assert!(matches!(
            encode(0x01, &payload, 0),
            Err(ProtocolError::OversizedPacket(65536))
        ));

        let payload = vec![0u8; MAX_PACKET_LEN - HEADER_LEN];
        let bytes = encode(0x01, &payload, 0).expect("largest packet fits");
        assert_eq!(&bytes[9..11], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_control_type_ids() {
        for id in 0xF0..=0xF5u8 {
            let ty = ControlType::from_id(id).expect("reserved id");
            assert_eq!(ty.id(), id);
            assert!(RESERVED_TYPES.contains(&id));
        }
        assert_eq!(ControlType::from_id(0xF6), None);
        assert_eq!(ControlType::HandshakeFromServer.to_string(), "HANDSHAKE_FROM_SERVER");
    }
}
