//! Editor-side bridge to the Coder CLI.
//!
//! The CLI listens on a local WebSocket. The bridge connects to it, turns the
//! CLI's proposed file changes into diff previews, answers its diagnostics
//! requests and forwards code from the editor as prompts. Editors plug in
//! through `editor::EditorHost` and `diff::DiffPresenter`.

pub mod app;
pub mod bridge;
pub mod bridge_ipc;
pub mod commands;
pub mod config;
pub mod console;
pub mod diff;
pub mod dictation;
pub mod editor;
pub mod error;
pub mod launcher;
pub mod status;

pub use bridge::Bridge;
pub use error::{Error, Result};
