//! Relay between browser script uploads and a runtime target.
//!
//! Three listeners share one process: a static HTTP server for the
//! browser UI, a WebSocket endpoint that decodes script uploads, and the
//! switch channel that delivers framed packets to the single attached
//! runtime target. The hand-off queue is the only state shared between
//! them; everything else owns its own sockets and buffers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod packet;
pub mod queue;
pub mod switch;
pub mod upload;

use config::RelayConfig;
use queue::ScriptQueue;
use switch::SwitchListener;

/// Run all three listeners until the shutdown token fires.
///
/// The queue is handed in by the caller so tests can push synthetic
/// packets and observe delivery without running every listener.
///
/// Shutdown joins the listeners in a fixed order (assets, websocket,
/// switch); each switch session's sender task is stopped and awaited
/// before its socket drops. Any listener error (a failed bind above all)
/// cancels the token so the whole relay winds down, and the error
/// propagates to the caller.
pub async fn run_relay(
    config: RelayConfig,
    queue: Arc<ScriptQueue>,
    cancel: CancellationToken,
) -> Result<()> {
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let ws_addr = SocketAddr::from(([0, 0, 0, 0], config.ws_port));

    if let Ok(ip) = local_ip_address::local_ip() {
        tracing::info!("http: browser UI at http://{}:{}/", ip, config.http_port);
    }

    let asset_task = spawn_listener(
        upload::start_asset_server(http_addr, config.asset_dir.clone(), cancel.clone()),
        cancel.clone(),
    );
    let upload_task = spawn_listener(
        upload::start_upload_server(ws_addr, queue.clone(), cancel.clone()),
        cancel.clone(),
    );

    let switch_task = {
        let queue = queue.clone();
        let token = cancel.clone();
        let port = config.switch_port;
        spawn_listener(
            async move {
                SwitchListener::bind(port, queue, token.clone())
                    .await?
                    .listen()
                    .await
            },
            cancel.clone(),
        )
    };

    // Fixed shutdown order: assets, websocket, switch.
    asset_task.await??;
    upload_task.await??;
    switch_task.await??;

    Ok(())
}

/// Spawn one listener; if it fails, cancel the shared token so the other
/// listeners stop instead of limping along without it.
fn spawn_listener<F>(fut: F, cancel: CancellationToken) -> JoinHandle<Result<()>>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let res = fut.await;
        if res.is_err() {
            cancel.cancel();
        }
        res
    })
}
