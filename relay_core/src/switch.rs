//! Switch channel listener.
//!
//! Owns the single TCP session with the runtime target: a dedicated
//! sender task drains the hand-off queue into framed packets on the wire
//! while the receive loop logs inbound status text. Sessions are strictly
//! sequential; a new connection is only accepted once the previous
//! session is fully torn down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::queue::ScriptQueue;

/// Bounded wait for each dequeue attempt. Keeps the sender responsive to
/// its stop signal without busy-waiting.
const SEND_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The runtime target only sends short status lines, so a small scratch
/// buffer is plenty.
const RECV_BUF_SIZE: usize = 1024;

/// State of the one switch slot. `Idle` waits in `accept`; `Connected`
/// owns the live stream. The accept loop transitions Idle -> Connected on
/// accept and Connected -> Idle on any session end, never holding both.
#[derive(Debug)]
enum SessionState {
    Idle,
    Connected(TcpStream, SocketAddr),
}

/// Accepts connections from the runtime target and delivers queued
/// packets to it, one session at a time.
pub struct SwitchListener {
    listener: TcpListener,
    queue: Arc<ScriptQueue>,
    cancel: CancellationToken,
}

impl SwitchListener {
    /// Bind the switch port. A failure here is fatal to the relay.
    pub async fn bind(
        port: u16,
        queue: Arc<ScriptQueue>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind switch port {}", port))?;

        info!("switch: listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            queue,
            cancel,
        })
    }

    /// The actual bound address (useful when bound to port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the shutdown token fires.
    ///
    /// Each accepted session is handled to completion before the next
    /// `accept`, so at most one runtime target is ever serviced; later
    /// connection attempts wait in the listen backlog.
    pub async fn listen(&self) -> Result<()> {
        let mut state = SessionState::Idle;

        loop {
            state = match state {
                SessionState::Idle => {
                    info!("switch: waiting for connection...");
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            info!("switch: listener shutting down");
                            break;
                        }
                        accepted = self.listener.accept() => match accepted {
                            Ok((stream, peer)) => {
                                info!("switch: connection from {}", peer);
                                SessionState::Connected(stream, peer)
                            }
                            Err(e) => {
                                warn!("switch: accept failed: {}", e);
                                SessionState::Idle
                            }
                        }
                    }
                }
                SessionState::Connected(stream, peer) => {
                    self.run_session(stream, peer).await;
                    SessionState::Idle
                }
            };
        }

        Ok(())
    }

    /// Drive one switch session to completion.
    ///
    /// Ends when the peer closes or resets the connection, a read or
    /// write fails, or the relay shuts down. Errors never escape the
    /// session; the caller just goes back to accepting.
    async fn run_session(&self, stream: TcpStream, peer: SocketAddr) {
        let session_cancel = self.cancel.child_token();
        let (mut reader, writer) = stream.into_split();

        let sender = tokio::spawn(run_sender(
            writer,
            self.queue.clone(),
            session_cancel.clone(),
        ));

        let mut buf = [0u8; RECV_BUF_SIZE];
        loop {
            tokio::select! {
                _ = session_cancel.cancelled() => break,
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        info!("switch: {} closed the connection", peer);
                        break;
                    }
                    Ok(n) => {
                        // Inbound bytes are opaque status text; log and move on.
                        let text = String::from_utf8_lossy(&buf[..n]);
                        info!("switch: {} -> {}", peer, text.trim_end());
                    }
                    Err(e) => {
                        warn!("switch: read error from {}: {}", peer, e);
                        break;
                    }
                },
            }
        }

        // Stop the sender and wait for it before the socket goes away so
        // no write can race with teardown.
        session_cancel.cancel();
        if let Err(e) = sender.await {
            warn!("switch: sender task join failed: {}", e);
        }

        info!("switch: session with {} ended", peer);
    }
}

/// Sender task: drains the hand-off queue into the connection, one frame
/// at a time. Each dequeue waits at most `SEND_POLL_INTERVAL` so the stop
/// signal is observed promptly; a write failure ends the whole session.
async fn run_sender(
    mut writer: OwnedWriteHalf,
    queue: Arc<ScriptQueue>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let Some(packet) = queue.pop(SEND_POLL_INTERVAL).await else {
            continue;
        };

        let frame = packet.encode();
        match writer.write_all(&frame).await {
            Ok(()) => {
                info!(
                    "switch: delivered '{}' ({} payload bytes, {} on the wire)",
                    packet.name,
                    packet.payload.len(),
                    frame.len()
                );
            }
            Err(e) => {
                warn!("switch: write failed, ending session: {}", e);
                cancel.cancel();
                break;
            }
        }
    }
}
