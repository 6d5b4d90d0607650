//! Session Counters
//!
//! Errors never escape `poll()`, so state plus these counters are what a caller
//! observes. Each [`Session`](crate::protocol::session::Session) owns one
//! [`SessionMetrics`], shared with its outbound link.
//!
//! Counters are atomics so recording only needs a shared reference.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Counters for one session
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Every handshake started, whatever its outcome
    pub handshakes_total: AtomicU64,
    /// Handshakes that reached `Connected`
    pub handshakes_success: AtomicU64,
    /// Handshakes that ended in backoff
    pub handshakes_failed: AtomicU64,
    /// Packets read from either transport
    pub packets_received: AtomicU64,
    /// Packets discarded before dispatch
    pub packets_dropped: AtomicU64,
    /// Packets handed to a transport
    pub packets_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    /// Packets routed to the unknown-packet handler
    pub unknown_packets: AtomicU64,
    /// Watchdog replies sent
    pub watchdogs_answered: AtomicU64,
    /// Connected sessions demoted by the liveness check
    pub liveness_losses: AtomicU64,
    /// Read/write failures on either transport
    pub transport_errors: AtomicU64,
}

#[inline]
fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

#[inline]
fn read(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handshake_attempt(&self) {
        bump(&self.handshakes_total, 1);
    }

    pub fn handshake_success(&self) {
        bump(&self.handshakes_success, 1);
    }

    pub fn handshake_failed(&self) {
        bump(&self.handshakes_failed, 1);
    }

    /// One packet of `len` bytes came in, valid or not.
    pub fn packet_received(&self, len: usize) {
        bump(&self.packets_received, 1);
        bump(&self.bytes_received, len as u64);
    }

    pub fn packet_dropped(&self) {
        bump(&self.packets_dropped, 1);
    }

    /// One packet of `len` bytes went out.
    pub fn packet_sent(&self, len: usize) {
        bump(&self.packets_sent, 1);
        bump(&self.bytes_sent, len as u64);
    }

    pub fn unknown_packet(&self) {
        bump(&self.unknown_packets, 1);
    }

    pub fn watchdog_answered(&self) {
        bump(&self.watchdogs_answered, 1);
    }

    pub fn liveness_lost(&self) {
        bump(&self.liveness_losses, 1);
    }

    pub fn transport_error(&self) {
        bump(&self.transport_errors, 1);
    }

    /// Plain copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            handshakes_total: read(&self.handshakes_total),
            handshakes_success: read(&self.handshakes_success),
            handshakes_failed: read(&self.handshakes_failed),
            packets_received: read(&self.packets_received),
            packets_dropped: read(&self.packets_dropped),
            packets_sent: read(&self.packets_sent),
            bytes_received: read(&self.bytes_received),
            bytes_sent: read(&self.bytes_sent),
            unknown_packets: read(&self.unknown_packets),
            watchdogs_answered: read(&self.watchdogs_answered),
            liveness_losses: read(&self.liveness_losses),
            transport_errors: read(&self.transport_errors),
        }
    }

    /// Emit every counter as one `info` event.
    pub fn log_metrics(&self) {
        let s = self.snapshot();
        info!(
            handshakes = s.handshakes_total,
            handshakes_ok = s.handshakes_success,
            handshakes_failed = s.handshakes_failed,
            rx_packets = s.packets_received,
            rx_dropped = s.packets_dropped,
            rx_bytes = s.bytes_received,
            tx_packets = s.packets_sent,
            tx_bytes = s.bytes_sent,
            unknown = s.unknown_packets,
            watchdogs = s.watchdogs_answered,
            liveness_losses = s.liveness_losses,
            transport_errors = s.transport_errors,
            "Session counters"
        );
    }
}

/// Point-in-time copy of [`SessionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub handshakes_total: u64,
    pub handshakes_success: u64,
    pub handshakes_failed: u64,
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub packets_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub unknown_packets: u64,
    pub watchdogs_answered: u64,
    pub liveness_losses: u64,
    pub transport_errors: u64,
}

/// Logs how long a scope took, at `debug`, when dropped.
pub struct Timer {
    started: Instant,
    label: &'static str,
}

impl Timer {
    pub fn start(label: &'static str) -> Self {
        Self {
            started: Instant::now(),
            label,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(
            operation = self.label,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Timed operation finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_into_snapshot() {
        let metrics = SessionMetrics::new();
        metrics.handshake_attempt();
        metrics.handshake_failed();
        metrics.handshake_attempt();
        metrics.handshake_success();
        metrics.packet_received(11);
        metrics.packet_received(20);
        metrics.packet_dropped();
        metrics.packet_sent(11);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.handshakes_total, 2);
        assert_eq!(snapshot.handshakes_success, 1);
        assert_eq!(snapshot.handshakes_failed, 1);
        assert_eq!(snapshot.packets_received, 2);
        assert_eq!(snapshot.bytes_received, 31);
        assert_eq!(snapshot.packets_dropped, 1);
        assert_eq!(snapshot.bytes_sent, 11);
        assert_eq!(snapshot.unknown_packets, 0);
    }

    #[test]
    fn test_fresh_snapshot_is_zero() {
        assert_eq!(SessionMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
