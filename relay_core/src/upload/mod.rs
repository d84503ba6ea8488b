//! Browser-facing side of the relay.
//!
//! Serves the static UI and decodes WebSocket script uploads into
//! packets on the hand-off queue.

pub mod server;
pub mod ws;

pub use server::{
    create_asset_router, create_upload_router, start_asset_server, start_upload_server,
};
pub use ws::{ProtocolError, UploadKind, handle_socket, parse_type_frame};
