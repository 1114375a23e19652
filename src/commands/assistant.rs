//! Add / explain / improve / fix actions contributed to the editor's code
//! actions, plus the chat-side commands that belong to a controller.

use std::{fmt::Write as _, path::Path};

use async_lsp::lsp_types::Range;

use crate::{
    bridge_ipc::{DiagnosticInfo, Severity},
    editor::ActiveEditor,
    error::Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantAction {
    Add,
    Explain,
    Improve,
    Fix,
}

impl AssistantAction {
    pub const fn command_id(self) -> &'static str {
        match self {
            Self::Add => "coder.addToChat",
            Self::Explain => "coder.ide.explainCode",
            Self::Improve => "coder.improveCode",
            Self::Fix => "coder.fixWithCoder",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Add => "Add to Coder",
            Self::Explain => "Explain with Coder",
            Self::Improve => "Improve with Coder",
            Self::Fix => "Fix with Coder",
        }
    }
}

/// Code and problems an assistant action operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    pub editor: ActiveEditor,
    pub range: Range,
    pub diagnostics: Vec<DiagnosticInfo>,
}

impl CommandContext {
    pub fn code(&self) -> &str {
        self.editor.document.text_in(self.range)
    }
}

pub fn build_assistant_prompt(action: AssistantAction, ctx: &CommandContext) -> String {
    let file_name = ctx.editor.document.file_name();
    let start_line = ctx.range.start.line + 1;
    let end_line = ctx.range.end.line + 1;
    let location = format!("{file_name} (lines {start_line}-{end_line})");

    let mut prompt = match action {
        AssistantAction::Add => format!("Code from {location}:"),
        AssistantAction::Explain => {
            format!("Explain the following code from {location} in detail:")
        }
        AssistantAction::Improve => format!(
            "Improve the following code from {location} \
             (for example readability, performance, best practices):"
        ),
        AssistantAction::Fix => format!("Fix the following problems in {location}:"),
    };

    let with_problems = matches!(action, AssistantAction::Add | AssistantAction::Fix);
    if with_problems && !ctx.diagnostics.is_empty() {
        prompt.push_str(&format_problems(&ctx.diagnostics));
    }
    let _ = write!(prompt, "\n```\n{}\n```", ctx.code());
    prompt
}

fn format_problems(diagnostics: &[DiagnosticInfo]) -> String {
    let mut problems = String::from("\nProblems:");
    for d in diagnostics {
        let severity = match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        let _ = write!(
            problems,
            "\n- [{severity}] {}:{} {}",
            d.line, d.character, d.message
        );
    }
    problems
}

/// Text added to the assistant input for captured terminal output.
pub fn terminal_output_prompt(contents: &str) -> String {
    format!("Terminal output:\n```\n{contents}\n```")
}

/// Chat-side operations that only exist when a chat controller is attached.
/// Hosts without one leave the capability out and the commands report
/// that they are unsupported.
pub trait Controller {
    fn focus_chat_input(&self, preserve_editor_focus: bool) -> Result<()>;
    fn open_walkthrough(&self) -> Result<()>;
    fn generate_commit_message(&self, repository: Option<&Path>) -> Result<()>;
    fn abort_commit_message(&self) -> Result<()>;
    fn reconstruct_task_history(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use async_lsp::lsp_types::Position;

    use super::*;
    use crate::editor::DocumentSnapshot;

    fn context(diagnostics: Vec<DiagnosticInfo>) -> CommandContext {
        CommandContext {
            editor: ActiveEditor {
                document: DocumentSnapshot::new("/w/main.py", "import os\nprint(x)\n"),
                selection: Range::default(),
            },
            range: Range::new(Position::new(1, 0), Position::new(1, 8)),
            diagnostics,
        }
    }

    fn undefined_x() -> DiagnosticInfo {
        DiagnosticInfo {
            file_path: "/w/main.py".into(),
            line: 2,
            character: 7,
            message: "\"x\" is not defined".into(),
            severity: Severity::Error,
            source: Some("pyright".into()),
        }
    }

    #[test]
    fn fix_prompt_lists_problems() {
        let prompt = build_assistant_prompt(AssistantAction::Fix, &context(vec![undefined_x()]));
        assert_eq!(
            prompt,
            "Fix the following problems in main.py (lines 2-2):\n\
             Problems:\n\
             - [error] 2:7 \"x\" is not defined\n\
             ```\nprint(x)\n```"
        );
    }

    #[test]
    fn explain_prompt_ignores_problems() {
        let prompt =
            build_assistant_prompt(AssistantAction::Explain, &context(vec![undefined_x()]));
        assert!(prompt.starts_with("Explain the following code from main.py (lines 2-2)"));
        assert!(!prompt.contains("Problems:"));
    }

    #[test]
    fn add_prompt_without_problems() {
        let prompt = build_assistant_prompt(AssistantAction::Add, &context(Vec::new()));
        assert_eq!(prompt, "Code from main.py (lines 2-2):\n```\nprint(x)\n```");
    }

    #[test]
    fn terminal_output_is_fenced() {
        assert_eq!(
            terminal_output_prompt("$ cargo test\nok"),
            "Terminal output:\n```\n$ cargo test\nok\n```"
        );
    }
}
