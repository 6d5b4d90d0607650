//! TCP control channel over `std::net`.

use super::StreamTransport;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, trace};

const READ_CHUNK: usize = 4096;
const PEEK_LEN: usize = 1024;

/// Non-blocking TCP stream.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            stream: None,
            connect_timeout,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    fn peek(&mut self) -> io::Result<usize> {
        let Some(stream) = self.stream.as_ref() else {
            return Ok(0);
        };
        let mut probe = [0u8; PEEK_LEN];
        stream.peek(&mut probe)
    }
}

impl StreamTransport for TcpTransport {
    fn connect(&mut self, addr: SocketAddr) -> io::Result<()> {
        self.stop();

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(self.connect_timeout))?;
        stream.set_nonblocking(true)?;

        debug!(%addr, "TCP stream connected");
        self.stream = Some(stream);
        Ok(())
    }

    fn connected(&mut self) -> bool {
        match self.peek() {
            // No stream, or orderly shutdown from the peer
            Ok(0) => false,
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(e) => {
                trace!(error = %e, "TCP peek failed");
                false
            }
        }
    }

    fn available(&mut self) -> usize {
        self.peek().unwrap_or(0)
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };

        let mut chunk = [0u8; READ_CHUNK];
        let mut total = 0;
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };

        // Writes block (bounded by the write timeout) so a packet is never half sent
        stream.set_nonblocking(false)?;
        let written = stream.write_all(bytes).and_then(|()| stream.flush());
        stream.set_nonblocking(true)?;
        written
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!("TCP stream closed");
        }
    }
}
