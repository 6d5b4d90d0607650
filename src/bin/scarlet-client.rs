//! Minimal Scarlet client.
//!
//! Usage: `scarlet-client [config.toml]`. Without a path the configuration is read
//! from `SCARLET_*` environment variables. `--example-config` prints a template.

use scarlet_protocol::config::{ScarletConfig, POLL_INTERVAL};
use scarlet_protocol::utils::logging::{init_logging, HexBytes};
use scarlet_protocol::{Result, Session};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Client terminated");
        eprintln!("scarlet-client: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(flag) if flag == "--example-config" => {
            print!("{}", ScarletConfig::example_config());
            return Ok(());
        }
        Some(path) => ScarletConfig::from_file(path)?,
        None => ScarletConfig::from_env()?,
    };
    config.validate_strict()?;
    init_logging(&config.logging)?;

    let mut session = Session::from_config(&config.client)?;
    session.set_unknown_handler(|ctx, packet| {
        info!(
            transport = %ctx.transport(),
            type_id = packet.type_id,
            contents = %HexBytes(packet.payload),
            "Application packet"
        );
        Ok(())
    });

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received CTRL+C signal, shutting down");
                break;
            }
            _ = ticker.tick() => session.poll(),
        }
    }

    session.shutdown();
    session.metrics().log_metrics();
    Ok(())
}
