use crate::core::packet::{encode, ControlType, Packet, RESERVED_TYPES};
use crate::error::{ProtocolError, Result};
use crate::protocol::link::Outbound;
use crate::protocol::watchdog::{self, Watchdog};
use crate::utils::logging::HexBytes;
use crate::utils::metrics::SessionMetrics;
use bytes::Bytes;
use std::fmt;
use tracing::{debug, warn};

/// Handler invoked synchronously for each validated packet of its type.
pub type PacketHandler =
    dyn FnMut(&mut PacketContext<'_>, &Packet<'_>) -> Result<()> + Send + 'static;

/// Which transport a packet arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => f.write_str("TCP"),
            Transport::Udp => f.write_str("UDP"),
        }
    }
}

/// What a handler can reach while it runs: the reply path and the watchdog.
pub struct PacketContext<'a> {
    transport: Transport,
    now_ms: u64,
    outbound: &'a mut dyn Outbound,
    watchdog: &'a mut Watchdog,
    metrics: &'a SessionMetrics,
}

impl<'a> PacketContext<'a> {
    pub fn new(
        transport: Transport,
        now_ms: u64,
        outbound: &'a mut dyn Outbound,
        watchdog: &'a mut Watchdog,
        metrics: &'a SessionMetrics,
    ) -> Self {
        Self {
            transport,
            now_ms,
            outbound,
            watchdog,
            metrics,
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Clock reading taken when the packet was dispatched.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Encode a packet stamped with the dispatch time.
    pub fn packet(&self, type_id: u8, payload: &[u8]) -> Result<Bytes> {
        encode(type_id, payload, self.now_ms)
    }

    pub fn send_tcp(&mut self, bytes: &[u8]) -> Result<()> {
        self.outbound.send_tcp(bytes)
    }

    pub fn send_udp(&mut self, bytes: &[u8]) -> Result<()> {
        self.outbound.send_udp(bytes)
    }

    /// Send on the transport the packet arrived on.
    pub fn reply(&mut self, bytes: &[u8]) -> Result<()> {
        match self.transport {
            Transport::Tcp => self.send_tcp(bytes),
            Transport::Udp => self.send_udp(bytes),
        }
    }

    pub fn metrics(&self) -> &SessionMetrics {
        self.metrics
    }

    pub(crate) fn watchdog_mut(&mut self) -> &mut Watchdog {
        &mut *self.watchdog
    }
}

enum Route {
    Watchdog,
    /// Control packets a client should never receive in steady state.
    Invalid,
    Handler(Box<PacketHandler>),
}

/// Routes packets to handlers by their one-byte type ID.
///
/// Control routes are installed at construction. Application handlers may be
/// added or replaced at any time, but never for [`RESERVED_TYPES`].
pub struct Dispatcher {
    routes: [Option<Route>; 256],
    fallback: Option<Box<PacketHandler>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut routes: [Option<Route>; 256] = std::array::from_fn(|_| None);
        routes[usize::from(ControlType::WatchdogFromServer.id())] = Some(Route::Watchdog);
        for control in [
            ControlType::WatchdogFromClient,
            ControlType::HandshakeFromClient,
            // Only meaningful inside the handshake exchange
            ControlType::HandshakeFromServer,
        ] {
            routes[usize::from(control.id())] = Some(Route::Invalid);
        }

        Self {
            routes,
            fallback: None,
        }
    }

    /// Register `handler` for `type_id`, replacing any previous one.
    ///
    /// # Errors
    /// `ReservedPacketType` for IDs in the protocol control range.
    pub fn register<F>(&mut self, type_id: u8, handler: F) -> Result<()>
    where
        F: FnMut(&mut PacketContext<'_>, &Packet<'_>) -> Result<()> + Send + 'static,
    {
        if RESERVED_TYPES.contains(&type_id) {
            return Err(ProtocolError::ReservedPacketType(type_id));
        }

        self.routes[usize::from(type_id)] = Some(Route::Handler(Box::new(handler)));
        Ok(())
    }

    /// Replace the default unknown-packet handler.
    pub fn set_fallback<F>(&mut self, handler: F)
    where
        F: FnMut(&mut PacketContext<'_>, &Packet<'_>) -> Result<()> + Send + 'static,
    {
        self.fallback = Some(Box::new(handler));
    }

    pub fn is_registered(&self, type_id: u8) -> bool {
        self.routes[usize::from(type_id)].is_some()
    }

    /// Run exactly one handler for `packet`. Handler errors are logged, not returned.
    pub fn dispatch(&mut self, packet: &Packet<'_>, ctx: &mut PacketContext<'_>) {
        let outcome = match self.routes[usize::from(packet.type_id)].as_mut() {
            Some(Route::Watchdog) => watchdog::handle_watchdog(ctx, packet),
            Some(Route::Invalid) => {
                handle_invalid(ctx, packet);
                Ok(())
            }
            Some(Route::Handler(handler)) => handler(&mut *ctx, packet),
            None => {
                ctx.metrics().unknown_packet();
                match self.fallback.as_mut() {
                    Some(handler) => handler(&mut *ctx, packet),
                    None => {
                        handle_unknown(ctx, packet);
                        Ok(())
                    }
                }
            }
        };

        if let Err(e) = outcome {
            warn!(
                transport = %ctx.transport(),
                type_id = packet.type_id,
                error = %e,
                "Packet handler failed"
            );
        }
    }
}

fn handle_invalid(ctx: &PacketContext<'_>, packet: &Packet<'_>) {
    debug!(
        transport = %ctx.transport(),
        packet_type = ?packet.control_type(),
        contents = %HexBytes(packet.as_bytes()),
        "Received invalid packet"
    );
}

fn handle_unknown(ctx: &PacketContext<'_>, packet: &Packet<'_>) {
    debug!(
        transport = %ctx.transport(),
        type_id = packet.type_id,
        contents = %HexBytes(packet.as_bytes()),
        "Received unknown packet"
    );
}
