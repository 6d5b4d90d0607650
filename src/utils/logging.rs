//! Structured logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! application's call. [`init_logging`] is the one the bundled client uses.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use std::fmt;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber configured from `config`.
///
/// `RUST_LOG` takes precedence over the configured verbosity when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.verbosity.level_filter().into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };

    installed.map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))?;

    tracing::info!(app = %config.app_name, verbosity = ?config.verbosity, "Logging initialized");
    Ok(())
}

/// Displays a byte slice as `[0x01 02 ff]`.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[0x")?;
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_bytes_format() {
        assert_eq!(HexBytes(&[0x01, 0x0a, 0xff]).to_string(), "[0x01 0a ff]");
        assert_eq!(HexBytes(&[]).to_string(), "[0x]");
    }
}
