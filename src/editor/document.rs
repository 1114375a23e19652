use std::path::PathBuf;

use async_lsp::lsp_types::{Position, Range};

/// Text of one open document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub path: PathBuf,
    pub text: String,
}

impl DocumentSnapshot {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Extract filename from path for display
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Number of lines, counting a trailing empty line after a final newline.
    pub fn line_count(&self) -> u32 {
        (self.text.split('\n').count()).try_into().unwrap_or(u32::MAX)
    }

    /// Index of the last line, not counting the empty line after a final newline.
    pub fn last_line(&self) -> u32 {
        let count = self.line_count();
        if self.text.ends_with('\n') {
            count.saturating_sub(2)
        } else {
            count.saturating_sub(1)
        }
    }

    /// Length of `line` in characters, without the line break.
    pub fn line_len(&self, line: u32) -> u32 {
        self.text
            .split('\n')
            .nth(line as usize)
            .map_or(0, |l| l.trim_end_matches('\r').chars().count())
            .try_into()
            .unwrap_or(u32::MAX)
    }

    /// Text covered by `range`, clamped to the document.
    pub fn text_in(&self, range: Range) -> &str {
        let start = self.offset_at(range.start);
        let end = self.offset_at(range.end).max(start);
        &self.text[start..end]
    }

    /// Convert a position to a byte offset, clamping past-the-end positions.
    fn offset_at(&self, pos: Position) -> usize {
        let mut offset = 0;
        for (index, line) in self.text.split_inclusive('\n').enumerate() {
            if index == pos.line as usize {
                let body = line.trim_end_matches(&['\n', '\r'][..]);
                return offset
                    + body
                        .char_indices()
                        .nth(pos.character as usize)
                        .map_or(body.len(), |(i, _)| i);
            }
            offset += line.len();
        }
        self.text.len()
    }
}

/// Editor with focus: its document and current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveEditor {
    pub document: DocumentSnapshot,
    pub selection: Range,
}

impl ActiveEditor {
    pub fn selected_text(&self) -> &str {
        self.document.text_in(self.selection)
    }

    pub fn has_selection(&self) -> bool {
        self.selection.start != self.selection.end
    }
}

/// Whether `outer` contains both ends of `inner`.
pub fn encloses(outer: Range, inner: Range) -> bool {
    contains(outer, inner.start) && contains(outer, inner.end)
}

fn contains(range: Range, pos: Position) -> bool {
    let key = |p: Position| (p.line, p.character);
    key(range.start) <= key(pos) && key(pos) <= key(range.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    #[test]
    fn text_in_spans_lines() {
        let doc = DocumentSnapshot::new("/a.rs", "fn main() {\n    run();\n}\n");
        assert_eq!(doc.text_in(range(0, 3, 1, 7)), "main() {\n    run");
        assert_eq!(doc.text_in(range(2, 0, 2, 1)), "}");
    }

    #[test]
    fn text_in_clamps_past_end() {
        let doc = DocumentSnapshot::new("/a.rs", "ab\ncd");
        assert_eq!(doc.text_in(range(1, 1, 9, 9)), "d");
        assert_eq!(doc.text_in(range(0, 50, 0, 60)), "");
    }

    #[test]
    fn line_metrics() {
        let doc = DocumentSnapshot::new("/a.rs", "one\r\nthree\n");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line_len(0), 3);
        assert_eq!(doc.line_len(1), 5);
        assert_eq!(doc.line_len(7), 0);
        assert_eq!(doc.last_line(), 1);
        assert_eq!(DocumentSnapshot::new("/b.rs", "one\ntwo").last_line(), 1);
        assert_eq!(DocumentSnapshot::new("/c.rs", "").last_line(), 0);
    }

    #[test]
    fn enclosure_is_inclusive() {
        let outer = range(1, 0, 4, 10);
        assert!(encloses(outer, range(1, 0, 4, 10)));
        assert!(encloses(outer, range(2, 3, 3, 0)));
        assert!(!encloses(outer, range(0, 9, 2, 0)));
        assert!(!encloses(outer, range(4, 0, 4, 11)));
    }

    #[test]
    fn empty_selection_detected() {
        let editor = ActiveEditor {
            document: DocumentSnapshot::new("/a.rs", "x"),
            selection: range(0, 1, 0, 1),
        };
        assert!(!editor.has_selection());
        assert_eq!(editor.selected_text(), "");
    }
}
