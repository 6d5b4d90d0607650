//! UDP data channel over `std::net`.

use super::DatagramTransport;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use tracing::debug;

/// Largest possible UDP payload.
const MAX_DATAGRAM: usize = 65_535;

/// Non-blocking UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    bind_ip: IpAddr,
    socket: Option<UdpSocket>,
    scratch: Vec<u8>,
}

impl UdpTransport {
    /// Listen on all IPv4 interfaces once `begin` is called.
    pub fn new() -> Self {
        Self::with_bind_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    pub fn with_bind_ip(bind_ip: IpAddr) -> Self {
        Self {
            bind_ip,
            socket: None,
            scratch: Vec::new(),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn bind(&mut self, port: u16) -> io::Result<&UdpSocket> {
        let socket = UdpSocket::bind(SocketAddr::new(self.bind_ip, port))?;
        socket.set_nonblocking(true)?;
        Ok(self.socket.insert(socket))
    }
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramTransport for UdpTransport {
    fn begin(&mut self, local_port: u16) -> io::Result<()> {
        self.stop();
        let socket = self.bind(local_port)?;
        debug!(local = ?socket.local_addr().ok(), "UDP listener started");
        Ok(())
    }

    fn recv(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let Some(socket) = self.socket.as_ref() else {
            return Ok(0);
        };

        if self.scratch.len() < MAX_DATAGRAM {
            self.scratch.resize(MAX_DATAGRAM, 0);
        }

        match socket.recv_from(&mut self.scratch) {
            Ok((len, _from)) => {
                buf.clear();
                buf.extend_from_slice(&self.scratch[..len]);
                Ok(len)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> io::Result<()> {
        if self.socket.is_none() {
            // Not listening yet; send from an ephemeral port
            self.bind(0)?;
        }
        let Some(socket) = self.socket.as_ref() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };
        socket.send_to(bytes, addr)?;
        Ok(())
    }

    fn stop(&mut self) {
        if self.socket.take().is_some() {
            debug!("UDP listener stopped");
        }
    }
}
