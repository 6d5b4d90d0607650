//! # Utility Modules
//!
//! Supporting utilities for timing, counters, and diagnostics.
//!
//! ## Components
//! - **Time**: Monotonic millisecond clocks and packet timestamp ticks
//! - **Metrics**: Per-session counters, the observable error signal
//! - **Logging**: Subscriber setup and hex formatting for packet dumps

pub mod logging;
pub mod metrics;
pub mod time;

pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use time::{Clock, ManualClock, MonotonicClock};
