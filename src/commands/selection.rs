//! Ask / explain / refactor actions on the active editor's selection.

use crate::{
    bridge_ipc::{ClientMessage, CursorPosition, PromptContext},
    editor::ActiveEditor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionAction {
    Ask,
    Explain,
    Refactor,
}

pub const ASK_PROMPT: &str = "What would you like to ask about this code?";
pub const ASK_PLACEHOLDER: &str = "Enter your question...";

impl SelectionAction {
    pub const fn command_id(self) -> &'static str {
        match self {
            Self::Ask => "coder.askAboutCode",
            Self::Explain => "coder.explainCode",
            Self::Refactor => "coder.refactorCode",
        }
    }

    /// Whether the action needs a question from the user first.
    pub const fn needs_question(self) -> bool {
        matches!(self, Self::Ask)
    }
}

/// Build the prompt text for `action`. `question` is only used by `Ask`.
pub fn build_prompt(action: SelectionAction, editor: &ActiveEditor, question: Option<&str>) -> String {
    let file_name = editor.document.file_name();
    let start_line = editor.selection.start.line + 1;
    let end_line = editor.selection.end.line + 1;
    let code = editor.selected_text();
    let lead = match action {
        SelectionAction::Ask => format!("{}\n\nCode from", question.unwrap_or_default()),
        SelectionAction::Explain => "Explain this code from".to_string(),
        SelectionAction::Refactor => "Suggest refactoring improvements for this code from".to_string(),
    };
    format!("{lead} {file_name} (lines {start_line}-{end_line}):\n```\n{code}\n```")
}

/// Wrap a prompt with the selection it refers to.
pub fn prompt_message(prompt: String, editor: &ActiveEditor) -> ClientMessage {
    ClientMessage::SendPrompt {
        prompt,
        context: prompt_context(editor),
    }
}

pub fn prompt_context(editor: &ActiveEditor) -> PromptContext {
    PromptContext {
        file_path: editor.document.path.clone(),
        selection: editor.selected_text().to_string(),
        cursor_position: CursorPosition {
            line: editor.selection.start.line,
            character: editor.selection.start.character,
        },
    }
}
