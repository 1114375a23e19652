//! Code actions offered at a location in a document.

use async_lsp::lsp_types::{Diagnostic, Position, Range};

use super::{assistant::AssistantAction, HostCommand};
use crate::editor::{encloses, DocumentSnapshot};

/// Lines of context added above and below the triggering range.
pub const CONTEXT_LINES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeActionKind {
    QuickFix,
    RefactorExtract,
    RefactorRewrite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeAction {
    pub title: &'static str,
    pub kind: CodeActionKind,
    pub command: HostCommand,
    pub is_preferred: bool,
}

/// Range the actions operate on: the user's selection when it encloses
/// `range`, otherwise `range` grown by `CONTEXT_LINES` whole lines on each
/// side, clamped to the document.
pub fn context_range(document: &DocumentSnapshot, range: Range, selection: Option<Range>) -> Range {
    if let Some(selection) = selection {
        if selection.start != selection.end && encloses(selection, range) {
            return selection;
        }
    }
    let last_line = document.line_count().saturating_sub(1);
    let start_line = range.start.line.saturating_sub(CONTEXT_LINES);
    let end_line = range.end.line.saturating_add(CONTEXT_LINES).min(last_line);
    Range::new(
        Position::new(start_line, 0),
        Position::new(end_line, document.line_len(end_line)),
    )
}

/// Add, Explain and Improve are always offered; Fix only when there are
/// diagnostics at the location, and then it is the preferred action.
pub fn provide_code_actions(
    document: &DocumentSnapshot,
    range: Range,
    selection: Option<Range>,
    diagnostics: &[Diagnostic],
) -> Vec<CodeAction> {
    let expanded = Some(context_range(document, range, selection));
    let action = |action: AssistantAction, kind, diagnostics: Vec<Diagnostic>| CodeAction {
        title: action.title(),
        kind,
        command: HostCommand::Assistant {
            action,
            range: expanded,
            diagnostics,
        },
        is_preferred: false,
    };

    let mut actions = vec![
        action(AssistantAction::Add, CodeActionKind::QuickFix, diagnostics.to_vec()),
        action(AssistantAction::Explain, CodeActionKind::RefactorExtract, Vec::new()),
        action(AssistantAction::Improve, CodeActionKind::RefactorRewrite, Vec::new()),
    ];
    if !diagnostics.is_empty() {
        let mut fix = action(AssistantAction::Fix, CodeActionKind::QuickFix, diagnostics.to_vec());
        fix.is_preferred = true;
        actions.push(fix);
    }
    actions
}
