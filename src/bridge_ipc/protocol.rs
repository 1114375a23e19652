use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Default port the Coder CLI listens on.
pub const DEFAULT_PORT: u16 = 51820;

/// Tags of every `ServerMessage` variant, as they appear on the wire.
const SERVER_MESSAGE_TYPES: &[&str] = &[
    "file_change",
    "close_diff",
    "status",
    "connection_ack",
    "diagnostics_request",
];

/// Severity of a diagnostic as reported to the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

/// Editor diagnostic translated for the CLI (1-indexed line and character).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticInfo {
    pub file_path: PathBuf,
    pub line: u32,
    pub character: u32,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Proposed change to a single file, keyed by the CLI's tool call id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub id: String,
    pub file_path: PathBuf,
    /// Full proposed file content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Unified diff, sent instead of `content` for partial edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Zero-indexed cursor position inside the prompt context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub character: u32,
}

/// Editor context attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptContext {
    pub file_path: PathBuf,
    pub selection: String,
    pub cursor_position: CursorPosition,
}

/// Messages sent from the CLI to the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    FileChange(FileChange),
    CloseDiff {
        id: String,
    },
    Status {
        #[serde(default)]
        model: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ConnectionAck {
        cli_version: String,
        protocol_version: String,
    },
    #[serde(rename_all = "camelCase")]
    DiagnosticsRequest {
        #[serde(default)]
        file_path: Option<PathBuf>,
    },
}

/// Messages sent from the editor to the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    DiagnosticsResponse {
        diagnostics: Vec<DiagnosticInfo>,
    },
    #[serde(rename_all = "camelCase")]
    Context {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workspace_folder: Option<PathBuf>,
        open_files: Vec<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        active_file: Option<PathBuf>,
        diagnostics: Vec<DiagnosticInfo>,
    },
    SendPrompt {
        prompt: String,
        context: PromptContext,
    },
}

/// Decode one inbound frame.
///
/// Returns `Ok(None)` for frames whose `type` this version does not know, so a
/// newer CLI can add message kinds without breaking the connection.
pub fn decode_server_message(text: &str) -> Result<Option<ServerMessage>> {
    let value: Value = serde_json::from_str(text)?;
    let known = value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|tag| SERVER_MESSAGE_TYPES.contains(&tag));
    if !known {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}
