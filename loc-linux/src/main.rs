// Location adapter daemon: bridge transport, report consumer, XTRA download.

mod bridge;
mod config;
mod daemon;
mod logging;
mod xtra;

use anyhow::Context;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("loc-linux {}", VERSION);
            return Ok(());
        }
    }

    let cfg = config::load()?;
    logging::init(&cfg.logging)?;
    info!(version = VERSION, bridge = %cfg.bridge_addr, "starting");

    let rt = tokio::runtime::Runtime::new().context("starting runtime")?;
    rt.block_on(async {
        let addr = bridge::BridgeAddr::parse(&cfg.bridge_addr);
        let (reader, writer) = bridge::connect(&addr).await?;
        daemon::run(cfg, reader, writer, shutdown_signal()).await
    })
}

/// Wait for Ctrl+C or SIGTERM (Unix). systemd restarts the unit on failure exits.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
