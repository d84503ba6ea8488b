//! WebSocket upload sub-protocol.
//!
//! One script upload is four frames on a single connection:
//!
//! ```text
//! client -> "type: script"        (text)
//! client -> "<declared length>"   (text, informational)
//! client -> "<script name>"       (text)
//! client -> <raw payload bytes>   (binary)
//! ```
//!
//! A completed sequence becomes one packet on the hand-off queue; a
//! partial sequence never produces anything.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::packet::Packet;
use crate::queue::ScriptQueue;

/// Literal prefix every type frame must carry.
const TYPE_PREFIX: &str = "type: ";

/// Upload kinds a type frame can announce. Only scripts exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Script,
}

/// Violations of the upload sub-protocol. All are recoverable: the
/// offending message (or partial sequence) is dropped and the decode
/// loop keeps serving the connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message does not start with `type: `")]
    MissingPrefix,
    #[error("unsupported upload kind `{0}`")]
    UnsupportedKind(String),
    #[error("expected a {expected} frame, got {got}")]
    UnexpectedFrame {
        expected: &'static str,
        got: &'static str,
    },
}

/// Map a type frame to an upload kind, failing closed on anything
/// unrecognized.
pub fn parse_type_frame(text: &str) -> Result<UploadKind, ProtocolError> {
    let tag = text
        .strip_prefix(TYPE_PREFIX)
        .ok_or(ProtocolError::MissingPrefix)?;

    match tag {
        "script" => Ok(UploadKind::Script),
        other => Err(ProtocolError::UnsupportedKind(other.to_string())),
    }
}

/// Per-connection decode loop. One iteration handles one logical
/// message; a completed script upload is pushed onto the hand-off queue.
/// No acknowledgement is sent back to the browser.
pub async fn handle_socket(mut socket: WebSocket, queue: Arc<ScriptQueue>, client_ip: String) {
    // Truncated UUID, enough to tell connections apart in the logs.
    let conn_id = Uuid::new_v4().to_string()[..8].to_string();
    tracing::info!("ws: [{}] connection from {}", conn_id, client_ip);

    loop {
        let msg = match socket.recv().await {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                tracing::warn!("ws: [{}] transport error: {}", conn_id, e);
                break;
            }
            None => break,
        };

        match msg {
            Message::Text(text) => match parse_type_frame(&text) {
                Ok(UploadKind::Script) => match recv_script(&mut socket).await {
                    Ok(Some(packet)) => {
                        tracing::info!(
                            "ws: [{}] received script '{}' ({} bytes)",
                            conn_id,
                            packet.name,
                            packet.payload.len()
                        );
                        queue.push(packet);
                    }
                    Ok(None) => {
                        tracing::info!(
                            "ws: [{}] connection went away mid-upload, partial script dropped",
                            conn_id
                        );
                        break;
                    }
                    Err(e) => {
                        // Partial sequence dropped; the connection stays up.
                        tracing::warn!("ws: [{}] dropping malformed upload: {}", conn_id, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("ws: [{}] {}", conn_id, e);
                }
            },
            Message::Close(_) => {
                tracing::info!("ws: [{}] client closed the connection", conn_id);
                break;
            }
            Message::Binary(_) => {
                tracing::warn!(
                    "ws: [{}] unexpected binary frame outside an upload, ignoring",
                    conn_id
                );
            }
            // axum answers pings on its own
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    tracing::info!("ws: [{}] connection ended", conn_id);
}

/// Receive the remaining three frames of a script upload.
///
/// `Ok(None)` means the peer went away mid-sequence; the caller should
/// stop serving the connection. A wrong frame kind yields an error and
/// leaves the connection usable.
async fn recv_script(socket: &mut WebSocket) -> Result<Option<Packet>, ProtocolError> {
    // Declared payload length, informational only: the binary frame's
    // actual size is what counts.
    let Some(declared_len) = recv_text(socket).await? else {
        return Ok(None);
    };

    let Some(name) = recv_text(socket).await? else {
        return Ok(None);
    };

    let Some(payload) = recv_binary(socket).await? else {
        return Ok(None);
    };

    match declared_len.trim().parse::<usize>() {
        Ok(n) if n == payload.len() => {}
        Ok(n) => tracing::debug!(
            "ws: declared length {} differs from received {} bytes",
            n,
            payload.len()
        ),
        Err(_) => tracing::debug!("ws: unparseable declared length '{}'", declared_len.trim()),
    }

    Ok(Some(Packet::script(name, payload)))
}

async fn recv_text(socket: &mut WebSocket) -> Result<Option<String>, ProtocolError> {
    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => return Ok(Some(text.to_string())),
            Some(Ok(Message::Binary(_))) => {
                return Err(ProtocolError::UnexpectedFrame {
                    expected: "text",
                    got: "binary",
                });
            }
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Ok(_)) => continue, // ping/pong keepalive
            Some(Err(_)) => return Ok(None),
        }
    }
}

async fn recv_binary(socket: &mut WebSocket) -> Result<Option<Bytes>, ProtocolError> {
    loop {
        match socket.recv().await {
            Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
            Some(Ok(Message::Text(_))) => {
                return Err(ProtocolError::UnexpectedFrame {
                    expected: "binary",
                    got: "text",
                });
            }
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Ok(_)) => continue,
            Some(Err(_)) => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_type_frame() {
        assert_eq!(parse_type_frame("type: script").unwrap(), UploadKind::Script);
    }

    #[test]
    fn test_missing_prefix_is_rejected() {
        assert!(matches!(
            parse_type_frame("script"),
            Err(ProtocolError::MissingPrefix)
        ));
        assert!(matches!(
            parse_type_frame("hi :3"),
            Err(ProtocolError::MissingPrefix)
        ));
    }

    #[test]
    fn test_unknown_kind_fails_closed() {
        let err = parse_type_frame("type: memory").unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedKind(ref k) if k == "memory"));
    }

    #[test]
    fn test_prefix_must_match_exactly() {
        // No trimming, no case folding.
        assert!(parse_type_frame("Type: script").is_err());
        assert!(parse_type_frame("type:script").is_err());
        assert!(parse_type_frame(" type: script").is_err());
    }
}
