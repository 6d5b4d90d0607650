//! # Configuration Management
//!
//! Centralized configuration for the Scarlet client.
//!
//! This module holds the protocol constants and the structured configuration for a
//! session: who we are, where the server lives, how long the watchdog may stay
//! silent, and how chatty the diagnostics should be.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - `SCARLET_*` environment variable overrides via `from_env()`
//!
//! ## Timing
//! - Reconnect backoff is 5 s after any failure, 60 s after a version rejection
//! - The handshake response wait is bounded at 5 s
//! - The watchdog timeout defaults to 5 s and may be changed on a live session

use crate::error::{constants, ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Protocol version announced in the client handshake
pub const PROTOCOL_VERSION: u8 = 0xC0;

/// Size of the fixed packet header: timestamp(8) + type(1) + length(2)
pub const HEADER_LEN: usize = 11;

/// Largest packet the 16-bit length field can describe
pub const MAX_PACKET_LEN: usize = u16::MAX as usize;

/// Delay before reconnecting after a transport failure, rejection, or liveness loss
pub const RECONNECT_BACKOFF: Duration = Duration::from_millis(5000);

/// Delay before reconnecting after the server reports incompatible versions
pub const INCOMPATIBLE_VERSION_BACKOFF: Duration = Duration::from_millis(60_000);

/// Bound on the synchronous wait for the server's handshake response
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default watchdog timeout
pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(5000);

/// Recommended interval between `poll()` calls (10 Hz)
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest `LoggingConfig::app_name` accepted
const MAX_APP_NAME_LEN: usize = 64;

/// Longest client name whose handshake still fits the 16-bit length field
pub const MAX_NAME_LEN: usize = (MAX_PACKET_LEN - HEADER_LEN - 4) / 2;

/// Everything the bundled client reads at startup.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ScarletConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ScarletConfig {
    /// Read and parse a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("Failed to open {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by any `SCARLET_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("SCARLET_CLIENT_NAME") {
            config.client.name = name;
        }

        if let Ok(addr) = std::env::var("SCARLET_SERVER_ADDRESS") {
            config.client.server_address = addr;
        }

        config.client.tcp_port = parse_env("SCARLET_TCP_PORT", config.client.tcp_port)?;
        config.client.udp_port = parse_env("SCARLET_UDP_PORT", config.client.udp_port)?;
        config.client.local_udp_port =
            parse_env("SCARLET_LOCAL_UDP_PORT", config.client.local_udp_port)?;

        if let Ok(timeout) = std::env::var("SCARLET_WATCHDOG_TIMEOUT_MS") {
            let millis = timeout.parse::<u64>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid SCARLET_WATCHDOG_TIMEOUT_MS: {e}"))
            })?;
            config.client.watchdog_timeout = Duration::from_millis(millis);
        }

        if let Ok(verbosity) = std::env::var("SCARLET_VERBOSITY") {
            config.logging.verbosity = Verbosity::from_name(&verbosity).ok_or_else(|| {
                ProtocolError::ConfigError(format!("Invalid SCARLET_VERBOSITY: {verbosity}"))
            })?;
        }

        Ok(config)
    }

    /// Defaults with `edit` applied; handy in tests and tools.
    pub fn default_with_overrides(edit: impl FnOnce(&mut Self)) -> Self {
        let mut config = Self::default();
        edit(&mut config);
        config
    }

    /// The default configuration rendered as TOML.
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to render config: {e}")))?;
        fs::write(path, text)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Every problem found in the configuration; empty when usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.client.validate();
        problems.extend(self.logging.validate());
        problems
    }

    /// Like [`validate`](Self::validate), folded into one `ConfigError`.
    pub fn validate_strict(&self) -> Result<()> {
        strict(self.validate())
    }
}

fn parse_env(key: &str, fallback: u16) -> Result<u16> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u16>()
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid {key}: {e}"))),
        Err(_) => Ok(fallback),
    }
}

fn strict(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::ConfigError(format!(
            "Configuration validation failed:\n  - {}",
            errors.join("\n  - ")
        )))
    }
}

/// Session configuration. Missing keys fall back to [`ClientConfig::default`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name announced to the server during the handshake
    pub name: String,

    /// Local port the UDP listener binds after a successful handshake
    pub local_udp_port: u16,

    /// Server IP address or hostname
    pub server_address: String,

    /// Server TCP (control) port
    pub tcp_port: u16,

    /// Server UDP (data) port
    pub udp_port: u16,

    /// Silence allowed between server watchdogs before the session is dropped
    #[serde(with = "duration_serde")]
    pub watchdog_timeout: Duration,

    /// Bound on a single TCP connect attempt
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: String::from("scarlet-client"),
            local_udp_port: 5289,
            server_address: String::from("127.0.0.1"),
            tcp_port: 5287,
            udp_port: 5288,
            watchdog_timeout: DEFAULT_WATCHDOG_TIMEOUT,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Resolve the server's TCP and UDP endpoints.
    pub fn server_endpoints(&self) -> Result<(SocketAddr, SocketAddr)> {
        Ok((
            resolve(&self.server_address, self.tcp_port)?,
            resolve(&self.server_address, self.udp_port)?,
        ))
    }

    /// Problems that would stop a session from being created.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.is_empty() {
            errors.push(constants::ERR_NAME_EMPTY.to_string());
        } else if self.name.len() > MAX_NAME_LEN {
            errors.push(format!(
                "Client name too long: {} bytes (maximum: {MAX_NAME_LEN})",
                self.name.len()
            ));
        }

        if self.server_address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if resolve(&self.server_address, self.tcp_port).is_err() {
            errors.push(format!(
                "Invalid server address: '{}' (expected an IP address or hostname)",
                self.server_address
            ));
        }

        for (label, port) in [
            ("Server TCP port", self.tcp_port),
            ("Server UDP port", self.udp_port),
            ("Local UDP port", self.local_udp_port),
        ] {
            if port == 0 {
                errors.push(format!("{label} must be greater than 0"));
            }
        }

        if self.watchdog_timeout.as_millis() < 100 {
            errors.push("Watchdog timeout too short (minimum: 100ms)".to_string());
        } else if self.watchdog_timeout.as_secs() > 3600 {
            errors.push("Watchdog timeout too long (maximum: 1 hour)".to_string());
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }

    pub fn validate_strict(&self) -> Result<()> {
        strict(self.validate())
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| ProtocolError::ConfigError(format!("{}: {e}", constants::ERR_ADDRESS_UNRESOLVED)))?
        .next()
        .ok_or_else(|| ProtocolError::ConfigError(constants::ERR_ADDRESS_UNRESOLVED.to_string()))
}

/// Diagnostic verbosity. Never changes protocol behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// No diagnostic output
    Quiet,
    /// Lifecycle events and discarded packets
    #[default]
    Basic,
    /// Everything, including packet hex dumps
    Trace,
}

impl Verbosity {
    /// Parse `quiet`/`basic`/`trace` or the numeric levels `0`/`1`/`2`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "quiet" | "0" => Some(Verbosity::Quiet),
            "basic" | "1" => Some(Verbosity::Basic),
            "trace" | "2" => Some(Verbosity::Trace),
            _ => None,
        }
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::OFF,
            Verbosity::Basic => LevelFilter::DEBUG,
            Verbosity::Trace => LevelFilter::TRACE,
        }
    }
}

/// Diagnostic output settings for the bundled client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Reported once when logging starts
    pub app_name: String,

    /// Diagnostic verbosity
    #[serde(default)]
    pub verbosity: Verbosity,

    /// One JSON object per event instead of compact text
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("scarlet-client"),
            verbosity: Verbosity::Basic,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.app_name.len() {
            0 => errors.push("Application name cannot be empty".to_string()),
            len if len > MAX_APP_NAME_LEN => errors.push(format!(
                "Application name too long: {len} characters (maximum: {MAX_APP_NAME_LEN})"
            )),
            _ => {}
        }

        errors
    }
}

/// `Duration` fields are written as whole milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
