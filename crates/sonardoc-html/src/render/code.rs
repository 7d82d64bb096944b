//! Code blocks: rendered in isolation, then flushed as a padded rectangle.

use ego_tree::NodeRef;
use scraper::{ElementRef, Node};

use super::{Ctx, RectRequest, Renderer};
use crate::dom::{
    DIFF_ADDED_CLASS, DIFF_CONTAINER_CLASS, DIFF_REMOVED_CLASS, find_descendant_with_class,
    has_class,
};
use crate::highlight::{CODE_BLOCK, DIFF_ADD, DIFF_DELETE, HighlightSpan};

/// Lines of a rendered code block with spans relative to its first line.
#[derive(Debug, Default)]
struct CodeLines {
    lines: Vec<String>,
    spans: Vec<HighlightSpan>,
    /// Full-width overlays, `(line, group)`.
    overlays: Vec<(usize, &'static str)>,
}

impl CodeLines {
    fn new(text: &str, spans: Vec<HighlightSpan>, overlays: Vec<(usize, &'static str)>) -> Self {
        let mut block = Self {
            lines: text.split('\n').map(str::to_string).collect(),
            spans,
            overlays,
        };
        block.trim_blank_edges();
        block
    }

    // Source HTML usually opens `<code>` with a newline and closes it after
    // one; neither belongs to the listing.
    fn trim_blank_edges(&mut self) {
        while self.lines.last().is_some_and(|l| l.trim().is_empty()) {
            self.lines.pop();
        }
        let leading = self
            .lines
            .iter()
            .take_while(|l| l.trim().is_empty())
            .count();
        if leading > 0 {
            self.lines.drain(..leading);
        }
        let count = self.lines.len();
        let shift = |lnum: usize| lnum.checked_sub(leading).filter(|l| *l < count);
        self.spans = std::mem::take(&mut self.spans)
            .into_iter()
            .filter_map(|mut span| {
                span.lnum = shift(span.lnum)?;
                Some(span)
            })
            .collect();
        self.overlays = std::mem::take(&mut self.overlays)
            .into_iter()
            .filter_map(|(lnum, group)| Some((shift(lnum)?, group)))
            .collect();
    }

    fn width(&self) -> usize {
        self.lines.iter().map(String::len).max().unwrap_or(0)
    }
}

pub(super) fn render_code_block(renderer: &mut Renderer<'_>, pre: ElementRef<'_>, ctx: &Ctx) {
    let code_ctx = ctx.preformatted();
    let mut sub = renderer.detached();
    sub.render_children(*pre, &code_ctx);
    let (text, spans, _) = sub.out.into_parts();
    flush_code_block(renderer, CodeLines::new(&text, spans, Vec::new()), ctx);
}

/// Diff listings: one line per child `<div>` of the diff container, each
/// tagged added or removed by its class.
pub(super) fn render_diff_block(renderer: &mut Renderer<'_>, pre: ElementRef<'_>, ctx: &Ctx) {
    let container = if has_class(&pre, DIFF_CONTAINER_CLASS) {
        Some(pre)
    } else {
        find_descendant_with_class(&pre, DIFF_CONTAINER_CLASS)
    };
    let Some(container) = container else {
        render_code_block(renderer, pre, ctx);
        return;
    };
    let code_ctx = ctx.preformatted();
    let mut sub = renderer.detached();
    let mut overlays: Vec<(usize, &'static str)> = Vec::new();
    let mut first_line = true;
    for child in container.children() {
        let Some(line_el) = diff_line(child) else {
            if !is_blank_text(child) {
                sub.render_node(child, &code_ctx);
            }
            continue;
        };
        if !first_line {
            sub.out.newline();
        }
        first_line = false;
        // Each diff line renders on its own so newlines hugging the `<div>`
        // content do not leave blank rows inside the block.
        let mut line_sub = renderer.detached();
        let line_ctx = line_sub.scoped(&line_el, &code_ctx);
        line_sub.render_children(*line_el, &line_ctx);
        let (line_text, line_spans, _) = line_sub.out.into_parts();
        let line_block = CodeLines::new(&line_text, line_spans, Vec::new());
        let start = sub.out.line();
        sub.out.append(&line_block.lines.join("\n"), &[]);
        for span in line_block.spans {
            sub.out.rebase(span, start, 0);
        }
        let group = if has_class(&line_el, DIFF_ADDED_CLASS) {
            Some(DIFF_ADD)
        } else if has_class(&line_el, DIFF_REMOVED_CLASS) {
            Some(DIFF_DELETE)
        } else {
            None
        };
        if let Some(group) = group {
            overlays.extend((start..=sub.out.line()).map(|line| (line, group)));
        }
    }
    let (text, spans, _) = sub.out.into_parts();
    flush_code_block(renderer, CodeLines::new(&text, spans, overlays), ctx);
}

fn diff_line(node: NodeRef<'_, Node>) -> Option<ElementRef<'_>> {
    ElementRef::wrap(node).filter(|el| el.value().name().eq_ignore_ascii_case("div"))
}

fn is_blank_text(node: NodeRef<'_, Node>) -> bool {
    match node.value() {
        Node::Text(text) => text.trim().is_empty(),
        Node::Comment(_) => true,
        _ => false,
    }
}

/// Pad every line to the block width, rebase token spans and overlays onto
/// the main buffer and queue the background rectangle. Inside a list item
/// the block starts at the item's continuation column.
fn flush_code_block(renderer: &mut Renderer<'_>, block: CodeLines, ctx: &Ctx) {
    if block.lines.is_empty() {
        return;
    }
    let indent = ctx.item_indent.unwrap_or(0);
    let margin = " ".repeat(indent);
    let out = &mut renderer.out;
    out.break_line();
    let width = block.width();
    let start = out.line();
    for line in &block.lines {
        let padded = format!("{line}{}", " ".repeat(width - line.len()));
        out.append(&margin, &[]);
        out.append(&padded, &ctx.ambient);
        out.newline();
    }
    for span in block.spans {
        out.rebase(span, start, indent);
    }
    for (lnum, group) in block.overlays {
        out.highlight(group, start + lnum, indent, indent + width);
    }
    out.queue_rect(RectRequest {
        start_line: start,
        end_line: start + block.lines.len() - 1,
        col: indent,
        group: CODE_BLOCK.to_string(),
        width: Some(width),
    });
    out.ensure_blank_line();
}
