//! Scripted transports shared by the integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use scarlet_protocol::config::ClientConfig;
use scarlet_protocol::core::packet::encode;
use scarlet_protocol::protocol::handshake::{HandshakeResult, ServerHello};
use scarlet_protocol::transport::{DatagramTransport, StreamTransport};
use scarlet_protocol::utils::time::{Clock, ManualClock};
use scarlet_protocol::Session;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const START_MS: u64 = 1_000;

#[derive(Debug, Default)]
pub struct StreamState {
    pub refuse_connect: bool,
    pub connected: bool,
    /// Chunks readable right now; one `read_available` drains them all.
    pub inbound: VecDeque<Vec<u8>>,
    /// Each write moves the next reply into `inbound`.
    pub replies: VecDeque<Vec<u8>>,
    pub written: Vec<Vec<u8>>,
    pub connects: usize,
    pub stops: usize,
    /// Clock step taken by every `available()` that finds nothing, so bounded
    /// waits terminate without real time passing.
    pub idle_advance: Option<Duration>,
    /// Peer hangs up right after the next write.
    pub close_on_write: bool,
}

#[derive(Clone)]
pub struct MockStream {
    state: Arc<Mutex<StreamState>>,
    clock: ManualClock,
}

impl MockStream {
    pub fn state(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap()
    }
}

impl StreamTransport for MockStream {
    fn connect(&mut self, _addr: SocketAddr) -> io::Result<()> {
        let mut state = self.state();
        state.connects += 1;
        if state.refuse_connect {
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        state.connected = true;
        Ok(())
    }

    fn connected(&mut self) -> bool {
        self.state().connected
    }

    fn available(&mut self) -> usize {
        let state = self.state();
        let pending: usize = state.inbound.iter().map(Vec::len).sum();
        if pending == 0 {
            if let Some(step) = state.idle_advance {
                self.clock.advance(step);
            }
        }
        pending
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let mut state = self.state();
        let mut read = 0;
        while let Some(chunk) = state.inbound.pop_front() {
            read += chunk.len();
            buf.extend_from_slice(&chunk);
        }
        Ok(read)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        state.written.push(bytes.to_vec());
        if state.close_on_write {
            state.connected = false;
            return Ok(());
        }
        if let Some(reply) = state.replies.pop_front() {
            state.inbound.push_back(reply);
        }
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state();
        state.connected = false;
        state.inbound.clear();
        state.stops += 1;
    }
}

#[derive(Debug, Default)]
pub struct DatagramState {
    pub bound: Option<u16>,
    pub inbound: VecDeque<Vec<u8>>,
    pub sent: Vec<(Vec<u8>, SocketAddr)>,
    pub begins: usize,
    pub stops: usize,
}

#[derive(Clone)]
pub struct MockDatagram {
    state: Arc<Mutex<DatagramState>>,
}

impl MockDatagram {
    pub fn state(&self) -> MutexGuard<'_, DatagramState> {
        self.state.lock().unwrap()
    }
}

impl DatagramTransport for MockDatagram {
    fn begin(&mut self, local_port: u16) -> io::Result<()> {
        let mut state = self.state();
        state.bound = Some(local_port);
        state.begins += 1;
        Ok(())
    }

    fn recv(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        buf.clear();
        match self.state().inbound.pop_front() {
            Some(datagram) => {
                buf.extend_from_slice(&datagram);
                Ok(datagram.len())
            }
            None => Ok(0),
        }
    }

    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> io::Result<()> {
        self.state().sent.push((bytes.to_vec(), addr));
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state();
        state.bound = None;
        state.stops += 1;
    }
}

pub type MockSession = Session<MockStream, MockDatagram, ManualClock>;

/// A session wired to scripted transports, plus handles to inspect them.
pub struct Harness {
    pub session: MockSession,
    pub tcp: MockStream,
    pub udp: MockDatagram,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let clock = ManualClock::new(START_MS);
        let tcp = MockStream {
            state: Arc::new(Mutex::new(StreamState::default())),
            clock: clock.clone(),
        };
        let udp = MockDatagram {
            state: Arc::new(Mutex::new(DatagramState::default())),
        };
        let session = Session::new(&config, tcp.clone(), udp.clone(), clock.clone()).unwrap();
        Self {
            session,
            tcp,
            udp,
            clock,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Queue the server's answer to the next TCP write.
    pub fn script_reply(&self, bytes: Vec<u8>) {
        self.tcp.state().replies.push_back(bytes);
    }

    /// Poll once with an accepting server and return the session in `Connected`.
    pub fn connect(&mut self) {
        self.script_reply(server_hello(HandshakeResult::Okay));
        self.session.poll();
        assert!(self.session.is_connected(), "{:?}", self.session.state());
    }

    pub fn push_udp(&self, bytes: Vec<u8>) {
        self.udp.state().inbound.push_back(bytes);
    }

    pub fn push_tcp(&self, bytes: Vec<u8>) {
        self.tcp.state().inbound.push_back(bytes);
    }

    pub fn udp_sent(&self) -> Vec<Vec<u8>> {
        self.udp
            .state()
            .sent
            .iter()
            .map(|(bytes, _)| bytes.clone())
            .collect()
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        name: "probe".to_string(),
        local_udp_port: 6001,
        server_address: "127.0.0.1".to_string(),
        tcp_port: 6000,
        udp_port: 6002,
        ..ClientConfig::default()
    }
}

pub fn server_hello(result: HandshakeResult) -> Vec<u8> {
    ServerHello {
        server_version: 0xC0,
        result,
    }
    .encode(0)
    .unwrap()
    .to_vec()
}

pub fn packet(type_id: u8, payload: &[u8]) -> Vec<u8> {
    encode(type_id, payload, 0).unwrap().to_vec()
}
