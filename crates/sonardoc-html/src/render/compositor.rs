use crate::highlight::HighlightSpan;
use crate::render::builder::RectRequest;

/// Turn queued background rectangles into one span per covered line.
/// Requests without a fixed width extend to the widest line (in bytes) of
/// their range.
pub fn composite_rects(text: &str, rects: &[RectRequest]) -> Vec<HighlightSpan> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut spans = Vec::new();
    for rect in rects {
        if rect.end_line < rect.start_line {
            continue;
        }
        let width = rect.width.unwrap_or_else(|| {
            (rect.start_line..=rect.end_line)
                .filter_map(|idx| lines.get(idx))
                .map(|line| line.len().saturating_sub(rect.col))
                .max()
                .unwrap_or(0)
        });
        if width == 0 {
            continue;
        }
        let end = rect.col + width;
        spans.extend(
            (rect.start_line..=rect.end_line)
                .map(|lnum| HighlightSpan::new(rect.group.clone(), lnum, rect.col, end)),
        );
    }
    spans
}

/// Drop spans whose line no longer exists in a text of `line_count` lines.
pub fn discard_out_of_range(spans: &mut Vec<HighlightSpan>, line_count: usize) {
    spans.retain(|span| span.lnum < line_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(start_line: usize, end_line: usize, width: Option<usize>) -> RectRequest {
        RectRequest {
            start_line,
            end_line,
            col: 0,
            group: "Bg".to_string(),
            width,
        }
    }

    #[test]
    fn width_defaults_to_widest_line_in_bytes() {
        let text = "ab\nxé z\nq\nignored line";
        let spans = composite_rects(text, &[rect(0, 2, None)]);
        assert_eq!(spans.len(), 3);
        let width = "xé z".len();
        assert!(spans.iter().all(|s| s.col_start == 0 && s.col_end == width));
    }

    #[test]
    fn fixed_width_wins() {
        let spans = composite_rects("a\nb", &[rect(1, 1, Some(8))]);
        assert_eq!(spans, vec![HighlightSpan::new("Bg", 1, 0, 8)]);
    }

    #[test]
    fn indented_rect_starts_at_its_column() {
        let request = RectRequest {
            col: 2,
            ..rect(0, 1, None)
        };
        let spans = composite_rects("  abc\n  a", &[request]);
        assert_eq!(
            spans,
            vec![
                HighlightSpan::new("Bg", 0, 2, 5),
                HighlightSpan::new("Bg", 1, 2, 5),
            ]
        );
    }

    #[test]
    fn out_of_range_spans_are_discarded() {
        let mut spans = composite_rects("a\nb", &[rect(0, 4, Some(1))]);
        assert_eq!(spans.len(), 5);
        discard_out_of_range(&mut spans, 2);
        let lines: Vec<usize> = spans.iter().map(|s| s.lnum).collect();
        assert_eq!(lines, vec![0, 1]);
    }
}
