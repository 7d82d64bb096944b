use crate::highlight::HighlightSpan;

/// Position of the write head. `char_col` counts characters for width math;
/// `byte_col` counts UTF-8 bytes, which is what highlight spans address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub line: usize,
    pub char_col: usize,
    pub byte_col: usize,
}

/// A background rectangle to paint once the final text is known.
/// `end_line` is inclusive and `col` is the byte column of its left edge.
/// Without a fixed width the widest line in range is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RectRequest {
    pub start_line: usize,
    pub end_line: usize,
    pub col: usize,
    pub group: String,
    pub width: Option<usize>,
}

/// Text buffer plus the highlight spans and rectangle requests that refer
/// into it.
#[derive(Debug, Default)]
pub struct TextBuilder {
    text: String,
    cursor: Cursor,
    spans: Vec<HighlightSpan>,
    rects: Vec<RectRequest>,
}

impl TextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn line(&self) -> usize {
        self.cursor.line
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn at_line_start(&self) -> bool {
        self.cursor.byte_col == 0
    }

    pub fn ends_with_space(&self) -> bool {
        self.text.ends_with(' ')
    }

    /// Write `s`, emitting one span per group for every non-empty line
    /// segment. Embedded `\n` advance the line.
    pub fn append(&mut self, s: &str, groups: &[String]) -> Cursor {
        for (idx, segment) in s.split('\n').enumerate() {
            if idx > 0 {
                self.newline();
            }
            if segment.is_empty() {
                continue;
            }
            let start = self.cursor.byte_col;
            self.text.push_str(segment);
            self.cursor.byte_col += segment.len();
            self.cursor.char_col += segment.chars().count();
            for group in groups {
                self.spans.push(HighlightSpan::new(
                    group.clone(),
                    self.cursor.line,
                    start,
                    self.cursor.byte_col,
                ));
            }
        }
        self.cursor
    }

    pub fn newline(&mut self) {
        self.text.push('\n');
        self.cursor.line += 1;
        self.cursor.char_col = 0;
        self.cursor.byte_col = 0;
    }

    /// End the current line if anything was written on it. Trailing spaces
    /// are dropped first and spans on this line are clamped to match.
    pub fn break_line(&mut self) {
        self.trim_line_end();
        if !self.at_line_start() {
            self.newline();
        }
    }

    /// Leave exactly one blank line before the next block. Does nothing at
    /// the very start of the buffer.
    pub fn ensure_blank_line(&mut self) {
        self.break_line();
        if self.text.is_empty() || self.text.ends_with("\n\n") {
            return;
        }
        self.newline();
    }

    pub fn highlight(&mut self, group: impl Into<String>, line: usize, start: usize, end: usize) {
        if end > start {
            self.spans.push(HighlightSpan::new(group, line, start, end));
        }
    }

    /// Re-add a span rendered in another buffer, shifted down `line` lines
    /// and right `col` bytes.
    pub fn rebase(&mut self, span: HighlightSpan, line: usize, col: usize) {
        self.highlight(
            span.hl_group,
            line + span.lnum,
            col + span.col_start,
            col + span.col_end,
        );
    }

    pub fn queue_rect(&mut self, request: RectRequest) {
        self.rects.push(request);
    }

    pub fn into_parts(self) -> (String, Vec<HighlightSpan>, Vec<RectRequest>) {
        (self.text, self.spans, self.rects)
    }

    fn trim_line_end(&mut self) {
        let line_start = self.text.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
        let trimmed_len = self.text[line_start..].trim_end_matches(' ').len();
        let removed = self.cursor.byte_col - trimmed_len;
        if removed == 0 {
            return;
        }
        self.text.truncate(line_start + trimmed_len);
        self.cursor.byte_col = trimmed_len;
        self.cursor.char_col -= removed;
        let line = self.cursor.line;
        self.spans.retain_mut(|span| {
            if span.lnum != line {
                return true;
            }
            span.col_end = span.col_end.min(trimmed_len);
            span.col_start < span.col_end
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn multibyte_spans_use_byte_columns() {
        let mut b = TextBuilder::new();
        b.append("ab ", &[]);
        let cursor = b.append("héllo→", &groups(&["G"]));
        assert_eq!(cursor.char_col, 9);
        assert_eq!(cursor.byte_col, 3 + "héllo→".len());
        let (text, spans, _) = b.into_parts();
        let span = &spans[0];
        assert_eq!(&text[span.col_start..span.col_end], "héllo→");
        assert_eq!(span.col_end - span.col_start, "héllo→".len());
    }

    #[test]
    fn append_splits_on_newlines() {
        let mut b = TextBuilder::new();
        b.append("one\n\nthree", &groups(&["G"]));
        assert_eq!(b.line(), 2);
        let (_, spans, _) = b.into_parts();
        let lines: Vec<usize> = spans.iter().map(|s| s.lnum).collect();
        assert_eq!(lines, vec![0, 2]);
    }

    #[test]
    fn break_line_trims_and_clamps_spans() {
        let mut b = TextBuilder::new();
        b.append("word  ", &groups(&["G"]));
        b.append(" ", &groups(&["Space"]));
        b.break_line();
        assert_eq!(b.text(), "word\n");
        let (_, spans, _) = b.into_parts();
        assert_eq!(spans, vec![HighlightSpan::new("G", 0, 0, 4)]);
    }

    #[test]
    fn blank_lines_never_stack() {
        let mut b = TextBuilder::new();
        b.ensure_blank_line();
        assert!(b.is_empty());
        b.append("a", &[]);
        b.ensure_blank_line();
        b.ensure_blank_line();
        b.break_line();
        assert_eq!(b.text(), "a\n\n");
        assert!(b.at_line_start());
    }
}
