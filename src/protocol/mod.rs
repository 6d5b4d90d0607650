//! # Session Protocol
//!
//! Everything above raw framing: routing packets to handlers, the handshake
//! exchange, watchdog supervision, and the connection state machine that ties
//! them together.
//!
//! ## Components
//! - **Dispatcher**: type ID to handler table with a fallback for unknown types
//! - **Handshake**: client/server hello encoding and result codes
//! - **Watchdog**: liveness bookkeeping and the automatic watchdog reply
//! - **Link**: outbound path shared by the session and handlers
//! - **Session**: the poll-driven state machine

pub mod dispatcher;
pub mod handshake;
pub mod link;
pub mod session;
pub mod watchdog;


pub use dispatcher::{Dispatcher, PacketContext, PacketHandler, Transport};
pub use handshake::{HandshakeResult, ServerHello};
pub use session::{ConnectionState, Session};
pub use watchdog::{Liveness, Watchdog};
