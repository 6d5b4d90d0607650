//! Connection state machine.
//!
//! A [`Session`] is driven entirely by [`Session::poll`]: the caller invokes it at
//! 10 Hz or faster and each call takes at most one step. No threads, timers, or
//! callbacks run outside that call.
//!
//! ```text
//!   Disconnected ──handshake ok──▶ Connected
//!        ▲   └──handshake failed──▶ Backoff ◀──liveness lost──┘
//!        └────────deadline passed────┘
//! ```
//!
//! Every failure lands in `Backoff` and the machine retries forever. The only
//! call that blocks is the handshake, which waits up to 5 s for the server's
//! response; callers must budget for that stall while (re)connecting.

use crate::config::{ClientConfig, HANDSHAKE_TIMEOUT};
use crate::core::packet::{encode, Packet};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::{Dispatcher, PacketContext, Transport};
use crate::protocol::handshake::{client_hello, ServerHello};
use crate::protocol::link::{Link, Outbound};
use crate::protocol::watchdog::Watchdog;
use crate::transport::{DatagramTransport, StreamTransport, TcpTransport, UdpTransport};
use crate::utils::logging::HexBytes;
use crate::utils::metrics::{SessionMetrics, Timer};
use crate::utils::time::{deadline, Clock, MonotonicClock};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Pause between checks while waiting for the handshake response.
const HANDSHAKE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; the next poll starts a handshake.
    Disconnected,
    /// Transient: held only while `poll()` runs the handshake.
    Handshaking,
    Connected,
    /// Refusing to reconnect until the clock reaches `until_ms`.
    Backoff { until_ms: u64 },
}

/// The single connection context of a client.
pub struct Session<T, U, C = MonotonicClock> {
    name: String,
    local_udp_port: u16,
    state: ConnectionState,
    link: Link<T, U>,
    dispatcher: Dispatcher,
    watchdog: Watchdog,
    clock: C,
    metrics: Arc<SessionMetrics>,
}

impl Session<TcpTransport, UdpTransport, MonotonicClock> {
    /// Session over real sockets and the process monotonic clock.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            config,
            TcpTransport::new(config.connect_timeout),
            UdpTransport::new(),
            MonotonicClock::new(),
        )
    }
}

impl<T, U, C> Session<T, U, C>
where
    T: StreamTransport,
    U: DatagramTransport,
    C: Clock,
{
    /// Validate `config`, resolve the server endpoints, and start `Disconnected`.
    pub fn new(config: &ClientConfig, tcp: T, udp: U, clock: C) -> Result<Self> {
        config.validate_strict()?;
        let (tcp_remote, udp_remote) = config.server_endpoints()?;
        let metrics = Arc::new(SessionMetrics::new());

        info!(
            name = %config.name,
            %tcp_remote,
            %udp_remote,
            local_udp_port = config.local_udp_port,
            "Session created"
        );

        Ok(Self {
            name: config.name.clone(),
            local_udp_port: config.local_udp_port,
            state: ConnectionState::Disconnected,
            link: Link::new(tcp, udp, tcp_remote, udp_remote, Arc::clone(&metrics)),
            dispatcher: Dispatcher::new(),
            watchdog: Watchdog::new(config.watchdog_timeout),
            clock,
            metrics,
        })
    }

    /// Advance the state machine by one step.
    ///
    /// While connected, reads at most one UDP datagram and one TCP read per call.
    pub fn poll(&mut self) {
        let now = self.clock.now_ms();

        match self.state {
            ConnectionState::Backoff { until_ms } => {
                if now >= until_ms {
                    debug!("Backoff elapsed");
                    self.state = ConnectionState::Disconnected;
                }
            }
            ConnectionState::Disconnected | ConnectionState::Handshaking => self.connect(),
            ConnectionState::Connected => {
                let tcp_up = self.link.tcp.connected();
                if let Err(e) = self.watchdog.check(now, tcp_up).into_result() {
                    self.metrics.liveness_lost();
                    self.link.tcp.stop();
                    self.link.udp.stop();
                    let delay = e.reconnect_delay();
                    warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "Disconnected from server");
                    self.enter_backoff(now, delay);
                    return;
                }

                self.receive_udp();
                self.receive_tcp();
            }
        }
    }

    fn connect(&mut self) {
        self.state = ConnectionState::Handshaking;
        self.metrics.handshake_attempt();
        let _timer = Timer::start("handshake");

        match self.handshake() {
            Ok(hello) => {
                self.watchdog.feed(self.clock.now_ms());
                self.state = ConnectionState::Connected;
                self.metrics.handshake_success();
                info!(
                    server_version = hello.server_version,
                    local_udp_port = self.local_udp_port,
                    "Connected to server"
                );
            }
            Err(e) => {
                self.link.tcp.stop();
                self.metrics.handshake_failed();
                let delay = e.reconnect_delay();
                warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "Handshake failed");
                self.enter_backoff(self.clock.now_ms(), delay);
            }
        }
    }

    fn handshake(&mut self) -> Result<ServerHello> {
        debug!(server = %self.link.tcp_remote, "Attempting server connection");
        self.link.tcp.connect(self.link.tcp_remote).map_err(|e| {
            debug!(error = %e, "TCP connect failed");
            ProtocolError::ConnectFailed
        })?;

        let hello = client_hello(&self.name, self.local_udp_port, self.clock.now_ms())?;
        trace!(len = hello.len(), "Sending handshake");
        self.link.send_tcp(&hello)?;

        let reply = self.await_reply()?;
        let hello = ServerHello::parse(&reply)?;
        debug!(
            server_version = hello.server_version,
            result = %hello.result,
            "Received handshake response"
        );
        let hello = hello.accepted()?;

        self.link.udp.begin(self.local_udp_port)?;
        Ok(hello)
    }

    /// Bounded wait for the first bytes of the server's handshake.
    fn await_reply(&mut self) -> Result<Vec<u8>> {
        let give_up_at = deadline(self.clock.now_ms(), HANDSHAKE_TIMEOUT);

        while self.link.tcp.available() == 0 {
            if self.clock.now_ms() > give_up_at {
                debug!("{}", constants::ERR_HANDSHAKE_TIMEOUT);
                return Err(ProtocolError::HandshakeTimeout);
            }
            if !self.link.tcp.connected() {
                debug!("{}", constants::ERR_HANDSHAKE_CLOSED);
                return Err(ProtocolError::ConnectionClosed);
            }
            std::thread::sleep(HANDSHAKE_POLL_INTERVAL);
        }

        let mut reply = Vec::new();
        self.link.tcp.read_available(&mut reply)?;
        trace!(len = reply.len(), contents = %HexBytes(&reply), "Handshake response bytes");
        Ok(reply)
    }

    fn enter_backoff(&mut self, now_ms: u64, delay: Duration) {
        self.state = ConnectionState::Backoff {
            until_ms: deadline(now_ms, delay),
        };
    }

    fn receive_udp(&mut self) {
        let mut datagram = Vec::new();
        match self.link.udp.recv(&mut datagram) {
            Ok(0) => {}
            Ok(_) => self.route(&datagram, Transport::Udp),
            Err(e) => {
                self.metrics.transport_error();
                warn!(error = %e, "UDP receive failed");
            }
        }
    }

    fn receive_tcp(&mut self) {
        if self.link.tcp.available() == 0 {
            return;
        }

        // Everything pending is treated as one packet
        let mut bytes = Vec::new();
        match self.link.tcp.read_available(&mut bytes) {
            Ok(0) => {}
            Ok(_) => self.route(&bytes, Transport::Tcp),
            Err(e) => {
                self.metrics.transport_error();
                warn!(error = %e, "TCP receive failed");
            }
        }
    }

    fn route(&mut self, bytes: &[u8], transport: Transport) {
        self.metrics.packet_received(bytes.len());
        trace!(%transport, len = bytes.len(), contents = %HexBytes(bytes), "Received packet");

        let packet = match Packet::validate(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.metrics.packet_dropped();
                debug!(%transport, error = %e, "Discarding malformed packet");
                return;
            }
        };

        let mut ctx = PacketContext::new(
            transport,
            self.clock.now_ms(),
            &mut self.link,
            &mut self.watchdog,
            &self.metrics,
        );
        self.dispatcher.dispatch(&packet, &mut ctx);
    }

    /// Register an application handler. See [`Dispatcher::register`].
    pub fn register_handler<F>(&mut self, type_id: u8, handler: F) -> Result<()>
    where
        F: FnMut(&mut PacketContext<'_>, &Packet<'_>) -> Result<()> + Send + 'static,
    {
        self.dispatcher.register(type_id, handler)
    }

    /// Replace the handler for packets with no registered type.
    pub fn set_unknown_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&mut PacketContext<'_>, &Packet<'_>) -> Result<()> + Send + 'static,
    {
        self.dispatcher.set_fallback(handler);
    }

    /// Encode a packet stamped with the session clock.
    pub fn packet(&self, type_id: u8, payload: &[u8]) -> Result<Bytes> {
        encode(type_id, payload, self.clock.now_ms())
    }

    /// Write a packet to the TCP stream. Fails without sending if the packet is
    /// shorter than a header or the stream is down.
    pub fn send_packet_tcp(&mut self, bytes: &[u8]) -> Result<()> {
        self.link.send_tcp(bytes)
    }

    /// Send a packet as one UDP datagram to the server's data port.
    pub fn send_packet_udp(&mut self, bytes: &[u8]) -> Result<()> {
        self.link.send_udp(bytes)
    }

    /// Close both transports and return to `Disconnected`.
    ///
    /// A later `poll()` reconnects.
    pub fn shutdown(&mut self) {
        self.link.tcp.stop();
        self.link.udp.stop();
        self.state = ConnectionState::Disconnected;
        info!("Session shut down");
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Reconnect deadline while in `Backoff`.
    pub fn backoff_until(&self) -> Option<u64> {
        match self.state {
            ConnectionState::Backoff { until_ms } => Some(until_ms),
            _ => None,
        }
    }

    pub fn last_watchdog_seen(&self) -> u64 {
        self.watchdog.last_seen_ms()
    }

    pub fn watchdog_timeout(&self) -> Duration {
        self.watchdog.timeout()
    }

    pub fn set_watchdog_timeout(&mut self, timeout: Duration) {
        self.watchdog.set_timeout(timeout);
    }

    pub fn client_name(&self) -> &str {
        &self.name
    }

    pub fn local_udp_port(&self) -> u16 {
        self.local_udp_port
    }

    pub fn tcp_endpoint(&self) -> SocketAddr {
        self.link.tcp_remote
    }

    pub fn udp_endpoint(&self) -> SocketAddr {
        self.link.udp_remote
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }
}
