//! # Scarlet Client
//!
//! A lightweight client for the Scarlet protocol: a supervised session with one
//! server over a TCP control channel and a UDP data channel.
//!
//! The crate is built for constrained, single-threaded callers. A [`Session`] owns
//! both transports and is advanced by calling [`Session::poll`] repeatedly
//! (10 Hz or more). Each poll either waits out a backoff, performs a handshake,
//! checks watchdog liveness, or processes at most one inbound packet per transport.
//!
//! ## Modules
//! - [`core`]: packet framing (11-byte header plus payload)
//! - [`protocol`]: dispatcher, handshake, watchdog, and the session state machine
//! - [`transport`]: the socket contract and its `std::net` implementations
//! - [`config`]: constants and TOML/env configuration
//! - [`utils`]: clocks, counters, logging setup
//!
//! ## Example
//! ```rust,no_run
//! use scarlet_protocol::config::{ClientConfig, POLL_INTERVAL};
//! use scarlet_protocol::Session;
//!
//! let config = ClientConfig::default();
//! let mut session = Session::from_config(&config)?;
//! session.register_handler(0x10, |ctx, packet| {
//!     let echo = ctx.packet(0x11, packet.payload)?;
//!     ctx.reply(&echo)
//! })?;
//!
//! loop {
//!     session.poll();
//!     std::thread::sleep(POLL_INTERVAL);
//! }
//! # Ok::<(), scarlet_protocol::ProtocolError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::config::{ClientConfig, ScarletConfig};
pub use crate::core::packet::Packet;
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::{ConnectionState, PacketContext, Session, Transport};
