//! Browser-facing listeners.
//!
//! Two independent ports: WebSocket script uploads on one, the static UI
//! assets on the other. Both wind down on the shared shutdown token.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use super::ws;
use crate::queue::ScriptQueue;

/// WebSocket upgrade handler
async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(queue): State<Arc<ScriptQueue>>,
    addr: Result<ConnectInfo<SocketAddr>, axum::extract::rejection::ExtensionRejection>,
) -> Response {
    let client_ip = addr
        .ok()
        .map(|a| a.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    ws.on_upgrade(move |socket| ws::handle_socket(socket, queue, client_ip))
}

/// Build the router that upgrades browser connections for script uploads.
pub fn create_upload_router(queue: Arc<ScriptQueue>) -> Router {
    Router::new()
        .route("/", get(ws_upgrade_handler))
        .with_state(queue)
}

/// Build the router serving the browser UI from `asset_dir`.
/// Plain GET file serving, nothing else.
pub fn create_asset_router(asset_dir: &Path) -> Router {
    Router::new().fallback_service(ServeDir::new(asset_dir))
}

/// Serve script uploads until the shutdown token fires.
pub async fn start_upload_server(
    addr: SocketAddr,
    queue: Arc<ScriptQueue>,
    cancel: CancellationToken,
) -> Result<()> {
    let router = create_upload_router(queue);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind websocket port {}", addr.port()))?;

    tracing::info!("ws: listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        cancel.cancelled().await;
        tracing::info!("ws: server shutting down gracefully");
    })
    .await?;

    Ok(())
}

/// Serve the static browser UI until the shutdown token fires.
pub async fn start_asset_server(
    addr: SocketAddr,
    asset_dir: PathBuf,
    cancel: CancellationToken,
) -> Result<()> {
    let router = create_asset_router(&asset_dir);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind http port {}", addr.port()))?;

    tracing::info!(
        "http: serving assets from {} on {}",
        asset_dir.display(),
        addr
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("http: server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_asset_router_serves_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>ui</html>").unwrap();

        let router = create_asset_router(dir.path());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/index.html")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_asset_router_missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();

        let router = create_asset_router(dir.path());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/nothing-here.js")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_route_rejects_plain_get() {
        let queue = Arc::new(ScriptQueue::new());

        let router = create_upload_router(queue);
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // Without the upgrade handshake headers this is not a WebSocket
        // request, so the route must refuse it.
        assert!(response.status().is_client_error());
    }
}
