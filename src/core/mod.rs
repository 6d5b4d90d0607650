//! # Core Protocol Components
//!
//! Packet framing for the Scarlet wire format.
//!
//! This module translates between raw transport bytes and structured packet fields.
//! It is stateless: no session knowledge, no payload interpretation.
//!
//! ## Wire Format
//! ```text
//! [Timestamp(8)] [TypeID(1)] [Length(2)] [Payload(N)]
//! ```
//! All integers are big-endian. `Length` counts the whole packet, header included.
//!
//! ## Validation
//! - Anything shorter than the 11-byte header is rejected
//! - The declared length must equal the number of bytes actually received
//! - Decoding borrows from the input; it never copies the payload

pub mod packet;
