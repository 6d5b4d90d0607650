//! # Transports
//!
//! The session talks to the server over one byte stream (control) and one datagram
//! socket (data). Both are collaborators behind small traits so the state machine
//! can be driven by real sockets or by scripted fakes.
//!
//! ## Contract
//! Every method returns promptly. The only blocking the session does on purpose is
//! the bounded handshake wait, which it implements itself on top of
//! [`StreamTransport::available`].
//!
//! ## Implementations
//! - [`TcpTransport`]: non-blocking `std::net::TcpStream`
//! - [`UdpTransport`]: non-blocking `std::net::UdpSocket`

use std::io;
use std::net::SocketAddr;

pub mod tcp;
pub mod udp;

pub use tcp::TcpTransport;
pub use udp::UdpTransport;

/// Connection-oriented control channel.
pub trait StreamTransport {
    /// Open a connection, replacing any existing one.
    fn connect(&mut self, addr: SocketAddr) -> io::Result<()>;

    /// Whether the stream is open and the peer has not closed it.
    fn connected(&mut self) -> bool;

    /// Bytes that can be read right now. Zero means nothing is pending.
    fn available(&mut self) -> usize;

    /// Append every byte pending right now to `buf`, returning how many were read.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Close the stream. Idempotent.
    fn stop(&mut self);
}

/// Connectionless data channel.
pub trait DatagramTransport {
    /// Start listening on `local_port`.
    fn begin(&mut self, local_port: u16) -> io::Result<()>;

    /// Replace `buf` with the next pending datagram and return its length, or 0 when
    /// none is pending.
    fn recv(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;

    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> io::Result<()>;

    /// Stop listening. Idempotent.
    fn stop(&mut self);
}
