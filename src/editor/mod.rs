//! Boundary to the editor hosting the bridge.
//!
//! The bridge never talks to an editor API directly. Everything it needs
//! (selection, diagnostics, messages, terminals, clipboard) goes through
//! `EditorHost`.

mod diagnostics;
mod document;

use std::path::{Path, PathBuf};

use async_lsp::lsp_types::Diagnostic;
pub use diagnostics::{convert_diagnostics, severity_of};
pub use document::{encloses, ActiveEditor, DocumentSnapshot};

use crate::{error::Result, status::StatusItem};

/// Level of a message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Warning,
    Error,
}

/// Host-assigned handle of an integrated terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerminalId(pub u64);

/// How to open an integrated terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalOptions {
    pub name: String,
    pub cwd: Option<PathBuf>,
    /// Open in the editor area next to the active editor.
    pub beside: bool,
    /// Show without taking focus from the editor.
    pub preserve_focus: bool,
    /// Shell to run instead of the user's default.
    pub shell: Option<(String, Vec<String>)>,
    pub icon: Option<String>,
}

#[allow(async_fn_in_trait)]
pub trait EditorHost {
    fn workspace_folder(&self) -> Option<PathBuf>;
    /// Paths of documents open from disk.
    fn open_documents(&self) -> Vec<PathBuf>;
    fn active_editor(&self) -> Option<ActiveEditor>;
    fn diagnostics(&self, path: &Path) -> Vec<Diagnostic>;
    fn all_diagnostics(&self) -> Vec<(PathBuf, Vec<Diagnostic>)>;

    fn show_message(&self, kind: MessageKind, text: &str);
    /// Show a message with buttons. Returns the chosen label, or `None` when dismissed.
    async fn ask(&self, kind: MessageKind, text: &str, actions: &[&str]) -> Option<String>;
    /// Ask for free text. Returns `None` when cancelled.
    async fn prompt_input(&self, prompt: &str, placeholder: &str) -> Option<String>;

    fn update_status(&self, item: &StatusItem);

    fn open_terminal(&self, options: &TerminalOptions) -> Result<TerminalId>;
    fn send_terminal_text(&self, terminal: TerminalId, text: &str) -> Result<()>;
    fn dispose_terminal(&self, terminal: TerminalId);
    fn has_active_terminal(&self) -> bool;
    /// Copy the active terminal's selection to the clipboard.
    async fn copy_terminal_selection(&self) -> Result<()>;

    async fn read_clipboard(&self) -> Result<String>;
    async fn write_clipboard(&self, text: &str) -> Result<()>;
}
