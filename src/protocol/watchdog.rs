//! Watchdog supervision.
//!
//! The server sends `WATCHDOG_FROM_SERVER` over UDP; the client answers each one
//! with a header-only `WATCHDOG_FROM_CLIENT` and remembers when it last heard from
//! the server. A connected session stays alive only while that memory is fresher
//! than the timeout and the TCP stream is still up.

use crate::core::packet::{ControlType, Packet};
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{PacketContext, Transport};
use crate::utils::time::deadline;
use std::time::Duration;
use tracing::{debug, trace};

/// Verdict of one liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    WatchdogExpired,
    TransportClosed,
}

impl Liveness {
    pub fn is_alive(self) -> bool {
        self == Liveness::Alive
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Liveness::Alive => Ok(()),
            Liveness::WatchdogExpired => Err(ProtocolError::WatchdogExpired),
            Liveness::TransportClosed => Err(ProtocolError::ConnectionClosed),
        }
    }
}

/// Last-seen timestamp and timeout threshold.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    last_seen_ms: u64,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_seen_ms: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Takes effect at the next liveness check.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Record that the server was heard from at `now_ms`.
    pub fn feed(&mut self, now_ms: u64) {
        self.last_seen_ms = now_ms;
    }

    pub fn last_seen_ms(&self) -> u64 {
        self.last_seen_ms
    }

    /// First instant at which the session counts as dead.
    pub fn expires_at(&self) -> u64 {
        deadline(self.last_seen_ms, self.timeout)
    }

    pub fn check(&self, now_ms: u64, transport_connected: bool) -> Liveness {
        if now_ms >= self.expires_at() {
            Liveness::WatchdogExpired
        } else if !transport_connected {
            Liveness::TransportClosed
        } else {
            Liveness::Alive
        }
    }
}

/// Answer a server watchdog. Watchdogs are UDP-only; TCP ones are dropped.
pub(crate) fn handle_watchdog(ctx: &mut PacketContext<'_>, _packet: &Packet<'_>) -> Result<()> {
    if ctx.transport() != Transport::Udp {
        debug!("Received TCP watchdog packet, ignoring");
        return Ok(());
    }

    trace!("Handling watchdog packet");
    let now = ctx.now_ms();
    ctx.watchdog_mut().feed(now);

    let reply = ctx.packet(ControlType::WatchdogFromClient.id(), &[])?;
    ctx.send_udp(&reply)?;
    ctx.metrics().watchdog_answered();
    Ok(())
}
