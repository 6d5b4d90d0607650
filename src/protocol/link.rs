//! Outbound packet path.
//!
//! Both the session's public send methods and packet handlers go through
//! [`Outbound`], so the header-length rule and the counters apply to every packet
//! that leaves the client.

use crate::config::HEADER_LEN;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::Transport;
use crate::transport::{DatagramTransport, StreamTransport};
use crate::utils::logging::HexBytes;
use crate::utils::metrics::SessionMetrics;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Sink for packets addressed to the server.
pub trait Outbound {
    /// Write `bytes` to the TCP stream if it is connected.
    fn send_tcp(&mut self, bytes: &[u8]) -> Result<()>;

    /// Send `bytes` as one UDP datagram. Attempted regardless of session state.
    fn send_udp(&mut self, bytes: &[u8]) -> Result<()>;
}

/// The two transports plus the server endpoints they talk to.
pub(crate) struct Link<T, U> {
    pub(crate) tcp: T,
    pub(crate) udp: U,
    pub(crate) tcp_remote: SocketAddr,
    pub(crate) udp_remote: SocketAddr,
    metrics: Arc<SessionMetrics>,
}

impl<T, U> Link<T, U> {
    pub(crate) fn new(
        tcp: T,
        udp: U,
        tcp_remote: SocketAddr,
        udp_remote: SocketAddr,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            tcp,
            udp,
            tcp_remote,
            udp_remote,
            metrics,
        }
    }

    fn sent(&self, transport: Transport, bytes: &[u8]) {
        self.metrics.packet_sent(bytes.len());
        trace!(%transport, len = bytes.len(), contents = %HexBytes(bytes), "Sent packet");
    }

    fn failed(&self, transport: Transport, error: std::io::Error) -> ProtocolError {
        self.metrics.transport_error();
        warn!(%transport, error = %error, "Send failed");
        ProtocolError::Io(error)
    }
}

fn check_len(transport: Transport, bytes: &[u8]) -> Result<()> {
    if bytes.len() < HEADER_LEN {
        debug!(%transport, len = bytes.len(), "{}", constants::ERR_SEND_TOO_SHORT);
        return Err(ProtocolError::TooShort {
            actual: bytes.len(),
            minimum: HEADER_LEN,
        });
    }
    Ok(())
}

impl<T: StreamTransport, U: DatagramTransport> Outbound for Link<T, U> {
    fn send_tcp(&mut self, bytes: &[u8]) -> Result<()> {
        check_len(Transport::Tcp, bytes)?;

        if !self.tcp.connected() {
            debug!(len = bytes.len(), "{}", constants::ERR_NOT_CONNECTED);
            return Err(ProtocolError::NotConnected);
        }

        match self.tcp.write_all(bytes) {
            Ok(()) => {
                self.sent(Transport::Tcp, bytes);
                Ok(())
            }
            Err(e) => Err(self.failed(Transport::Tcp, e)),
        }
    }

    fn send_udp(&mut self, bytes: &[u8]) -> Result<()> {
        check_len(Transport::Udp, bytes)?;

        match self.udp.send_to(bytes, self.udp_remote) {
            Ok(()) => {
                self.sent(Transport::Udp, bytes);
                Ok(())
            }
            Err(e) => Err(self.failed(Transport::Udp, e)),
        }
    }
}
