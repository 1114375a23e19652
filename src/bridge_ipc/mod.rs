//! Communication between the editor host and the Coder CLI.
//!
//! This module provides:
//! - `protocol`: Tagged JSON messages exchanged over the WebSocket
//! - `transport`: Client-side connection to the CLI

mod protocol;
mod transport;

pub use protocol::{
    decode_server_message, ClientMessage, CursorPosition, DiagnosticInfo, FileChange,
    PromptContext, ServerMessage, Severity, DEFAULT_PORT,
};
pub use transport::{ConnectionState, Transport};
