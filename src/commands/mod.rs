//! Commands the bridge exposes to its host.
//!
//! This module provides:
//! - `selection`: ask / explain / refactor on the current selection
//! - `assistant`: add / explain / improve / fix on a code range, and the
//!   optional chat controller
//! - `code_actions`: code actions contributed at a document location

mod assistant;
mod code_actions;
mod selection;

use std::path::PathBuf;

use async_lsp::lsp_types::{Diagnostic, Range};
pub use assistant::{
    build_assistant_prompt, terminal_output_prompt, AssistantAction, CommandContext, Controller,
};
pub use code_actions::{context_range, provide_code_actions, CodeAction, CodeActionKind, CONTEXT_LINES};
pub use selection::{
    build_prompt, prompt_context, prompt_message, SelectionAction, ASK_PLACEHOLDER, ASK_PROMPT,
};

use crate::{
    error::{BridgeError, Result},
    launcher::BOT_MENU_COMMAND,
};

/// Every command a host can invoke, with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Connect,
    Disconnect,
    StartCli,
    OpenSplitTerminal,
    Selection(SelectionAction),
    Assistant {
        action: AssistantAction,
        /// Range to operate on; the active selection when absent.
        range: Option<Range>,
        diagnostics: Vec<Diagnostic>,
    },
    FocusChatInput {
        preserve_editor_focus: bool,
    },
    OpenWalkthrough,
    GenerateCommitMessage {
        repository: Option<PathBuf>,
    },
    AbortCommitMessage,
    ReconstructTaskHistory,
    AddTerminalOutputToChat,
    ShowBotMenu,
    /// Present the pending change recorded under `id`.
    ShowDiff {
        id: String,
    },
}

impl HostCommand {
    pub const fn id(&self) -> &'static str {
        match self {
            Self::Connect => "coder.connect",
            Self::Disconnect => "coder.disconnect",
            Self::StartCli => "coder.startCli",
            Self::OpenSplitTerminal => "coder.openSplitTerminal",
            Self::Selection(action) => action.command_id(),
            Self::Assistant { action, .. } => action.command_id(),
            Self::FocusChatInput { .. } => "coder.focusChatInput",
            Self::OpenWalkthrough => "coder.openWalkthrough",
            Self::GenerateCommitMessage { .. } => "coder.generateGitCommitMessage",
            Self::AbortCommitMessage => "coder.abortGitCommitMessage",
            Self::ReconstructTaskHistory => "coder.reconstructTaskHistory",
            Self::AddTerminalOutputToChat => "coder.addTerminalOutputToChat",
            Self::ShowBotMenu => BOT_MENU_COMMAND,
            Self::ShowDiff { .. } => "coder.showDiff",
        }
    }

    /// Look up a command by id, with default arguments.
    pub fn from_id(id: &str) -> Result<Self> {
        let assistant = |action| Self::Assistant {
            action,
            range: None,
            diagnostics: Vec::new(),
        };
        let cmd = match id {
            "coder.connect" => Self::Connect,
            "coder.disconnect" => Self::Disconnect,
            "coder.startCli" => Self::StartCli,
            "coder.openSplitTerminal" => Self::OpenSplitTerminal,
            "coder.askAboutCode" => Self::Selection(SelectionAction::Ask),
            "coder.explainCode" => Self::Selection(SelectionAction::Explain),
            "coder.refactorCode" => Self::Selection(SelectionAction::Refactor),
            "coder.addToChat" => assistant(AssistantAction::Add),
            "coder.ide.explainCode" => assistant(AssistantAction::Explain),
            "coder.improveCode" => assistant(AssistantAction::Improve),
            "coder.fixWithCoder" => assistant(AssistantAction::Fix),
            "coder.focusChatInput" => Self::FocusChatInput {
                preserve_editor_focus: false,
            },
            "coder.openWalkthrough" => Self::OpenWalkthrough,
            "coder.generateGitCommitMessage" => Self::GenerateCommitMessage { repository: None },
            "coder.abortGitCommitMessage" => Self::AbortCommitMessage,
            "coder.reconstructTaskHistory" => Self::ReconstructTaskHistory,
            "coder.addTerminalOutputToChat" => Self::AddTerminalOutputToChat,
            BOT_MENU_COMMAND => Self::ShowBotMenu,
            "coder.showDiff" => Self::ShowDiff { id: String::new() },
            other => return Err(BridgeError::UnknownCommand(other.to_string()).into()),
        };
        Ok(cmd)
    }
}
