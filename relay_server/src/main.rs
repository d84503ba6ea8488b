use anyhow::Result;
use relay_core::config::RelayConfig;
use relay_core::queue::ScriptQueue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 0. Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Load configuration (listener ports and asset root)
    let config = RelayConfig::load();
    tracing::info!(
        "starting relay: switch port {}, http port {}, ws port {}",
        config.switch_port,
        config.http_port,
        config.ws_port
    );

    // 2. Shared hand-off queue and shutdown token
    let queue = Arc::new(ScriptQueue::new());
    let cancel = CancellationToken::new();

    // 3. An interrupt is the only control surface; it triggers the
    //    shutdown sequence.
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down...");
            signal_cancel.cancel();
        }
    });

    // 4. Run until every listener has wound down
    relay_core::run_relay(config, queue, cancel).await?;

    tracing::info!("exiting...");
    Ok(())
}
