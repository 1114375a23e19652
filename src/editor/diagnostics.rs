//! Translation of editor diagnostics into the CLI's 1-indexed form.

use std::path::Path;

use async_lsp::lsp_types::{Diagnostic, DiagnosticSeverity};

use crate::bridge_ipc::{DiagnosticInfo, Severity};

pub fn convert_diagnostics(path: &Path, diagnostics: &[Diagnostic]) -> Vec<DiagnosticInfo> {
    diagnostics
        .iter()
        .map(|d| DiagnosticInfo {
            file_path: path.to_path_buf(),
            line: d.range.start.line + 1,
            character: d.range.start.character + 1,
            message: d.message.clone(),
            severity: severity_of(d.severity),
            source: d.source.clone(),
        })
        .collect()
}

/// Diagnostics without a severity are treated as errors.
pub fn severity_of(severity: Option<DiagnosticSeverity>) -> Severity {
    match severity {
        Some(DiagnosticSeverity::WARNING) => Severity::Warning,
        Some(DiagnosticSeverity::INFORMATION) => Severity::Info,
        Some(DiagnosticSeverity::HINT) => Severity::Hint,
        _ => Severity::Error,
    }
}
