//! Tree-to-text walker: turns a parsed document into flat text plus byte
//! addressed highlight spans.

pub mod builder;
mod code;
pub mod compositor;
mod table;

use std::ops::Deref;

use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node};

use crate::css::StylePalette;
use crate::dom::{
    self, ElementKind, classify, collapse_whitespace, collect_raw_text, flatten_text,
    has_block_child, has_block_descendant,
};
use crate::highlight::{
    self, DEFINITION_TERM, HighlightSpan, INLINE_CODE, LINK_TEXT, LINK_URL, LIST_MARKER, QUOTE,
    RULE,
};
use crate::pipeline::RenderOptions;

pub use builder::{Cursor, RectRequest, TextBuilder};

const HEADING_GLYPHS: [&str; 6] = ["◉", "◎", "○", "◆", "◇", "▪"];
const LIST_BULLETS: [&str; 3] = ["•", "◦", "▪"];
const QUOTE_BORDER: &str = "▎ ";
const RULE_GLYPH: &str = "─";
const INDENT: &str = "  ";

/// Per-subtree render state. Extended by cloning on the way down, never
/// mutated in place.
#[derive(Debug, Clone, Default)]
pub(crate) struct Ctx {
    in_pre: bool,
    ambient: Vec<String>,
    in_link: bool,
    list_depth: usize,
    /// Column that continuation lines of the enclosing list item or
    /// definition start at. Set while block children render inline.
    item_indent: Option<usize>,
}

impl Ctx {
    fn with_group(&self, group: &str) -> Ctx {
        let mut next = self.clone();
        next.ambient.push(group.to_string());
        next
    }

    fn preformatted(&self) -> Ctx {
        Ctx {
            in_pre: true,
            ..self.clone()
        }
    }

    fn linked(&self) -> Ctx {
        Ctx {
            in_link: true,
            ..self.with_group(LINK_TEXT)
        }
    }

    fn groups_with(&self, group: &str) -> Vec<String> {
        let mut groups = self.ambient.clone();
        groups.push(group.to_string());
        groups
    }
}

/// Walk `document` (its `<body>` when present) and return the raw output:
/// text, token/structural spans and pending background rectangles.
pub fn render_tree(
    document: &Html,
    palette: &StylePalette,
    options: &RenderOptions,
) -> (String, Vec<HighlightSpan>, Vec<RectRequest>) {
    let mut renderer = Renderer::new(palette, options);
    let ctx = Ctx::default();
    match dom::find_body(document) {
        Some(body) => renderer.render_children(*body, &ctx),
        None => renderer.render_children(*document.root_element(), &ctx),
    }
    renderer.out.into_parts()
}

pub(crate) struct Renderer<'a> {
    palette: &'a StylePalette,
    options: &'a RenderOptions,
    pub(crate) out: TextBuilder,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(palette: &'a StylePalette, options: &'a RenderOptions) -> Self {
        Self {
            palette,
            options,
            out: TextBuilder::new(),
        }
    }

    /// Fresh renderer sharing palette and options, for isolated sub-renders.
    fn detached(&self) -> Renderer<'a> {
        Renderer::new(self.palette, self.options)
    }

    fn link_icon(&self, ctx: &Ctx) -> Option<&str> {
        (!ctx.in_link).then_some(self.options.link_icon.as_str())
    }

    fn render_children(&mut self, node: NodeRef<'_, Node>, ctx: &Ctx) {
        for child in node.children() {
            self.render_node(child, ctx);
        }
    }

    fn render_node(&mut self, node: NodeRef<'_, Node>, ctx: &Ctx) {
        match node.value() {
            Node::Text(text) => self.render_text(text.deref(), ctx),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.render_element(element, ctx);
                }
            }
            Node::Document | Node::Fragment => self.render_children(node, ctx),
            _ => {}
        }
    }

    /// Extend the context with the groups bound to this element's classes:
    /// syntax-token classes first, then CSS-derived ones.
    fn scoped(&self, element: &ElementRef<'_>, ctx: &Ctx) -> Ctx {
        let mut added: Vec<String> = Vec::new();
        for class in element.value().classes() {
            if let Some(group) = highlight::token_group(class) {
                added.push(group.to_string());
            }
            if let Some(group) = self.palette.group_for_class(class) {
                added.push(group.to_string());
            }
        }
        if added.is_empty() {
            return ctx.clone();
        }
        let mut next = ctx.clone();
        next.ambient.extend(added);
        next
    }

    fn render_text(&mut self, raw: &str, ctx: &Ctx) {
        if ctx.in_pre {
            let text = raw.replace("\r\n", "\n");
            self.out.append(&text, &ctx.ambient);
            return;
        }
        let collapsed = collapse_whitespace(raw);
        let skip_leading = self.out.at_line_start() || self.out.ends_with_space();
        if collapsed.trim().is_empty() {
            if !skip_leading {
                self.out.append(" ", &[]);
            }
            return;
        }
        let text = if skip_leading {
            collapsed.trim_start()
        } else {
            collapsed.as_str()
        };
        self.out.append(text, &ctx.ambient);
    }

    fn render_element(&mut self, element: ElementRef<'_>, ctx: &Ctx) {
        let kind = classify(&element);
        if kind == ElementKind::Hidden {
            return;
        }
        let ctx = self.scoped(&element, ctx);
        if ctx.in_pre {
            match kind {
                ElementKind::Break => self.out.newline(),
                ElementKind::Image => {}
                _ => self.render_children(*element, &ctx),
            }
            return;
        }
        match kind {
            ElementKind::Heading(level) => self.render_heading(element, level, &ctx),
            ElementKind::Paragraph => self.render_paragraph(element, &ctx),
            ElementKind::List { ordered } => self.render_list(element, ordered, &ctx),
            ElementKind::DefinitionList => {
                self.out.break_line();
                self.render_children(*element, &ctx);
                self.out.ensure_blank_line();
            }
            ElementKind::DefinitionTerm => {
                self.out.break_line();
                self.render_children(*element, &ctx.with_group(DEFINITION_TERM));
                self.out.break_line();
            }
            ElementKind::DefinitionDetail => self.render_definition_detail(element, &ctx),
            ElementKind::Table => table::render_table(self, element, &ctx),
            ElementKind::CodeBlock => code::render_code_block(self, element, &ctx),
            ElementKind::DiffBlock => code::render_diff_block(self, element, &ctx),
            ElementKind::Blockquote => self.render_blockquote(element, &ctx),
            ElementKind::Link => self.render_link(element, &ctx),
            ElementKind::InlineCode => self.render_inline_code(element, &ctx),
            ElementKind::Break => self.out.newline(),
            ElementKind::Rule => self.render_rule(&ctx),
            ElementKind::Image | ElementKind::Hidden => {}
            ElementKind::Container => self.render_container(element, &ctx),
            ElementKind::Inline => self.render_children(*element, &ctx),
        }
    }

    fn render_heading(&mut self, element: ElementRef<'_>, level: u8, ctx: &Ctx) {
        self.out.break_line();
        let ctx = ctx.with_group(highlight::header_group(level));
        let glyph = HEADING_GLYPHS[usize::from(level.clamp(1, 6)) - 1];
        self.out.append(&format!("{glyph} "), &ctx.ambient);
        self.render_children(*element, &ctx);
        self.out.ensure_blank_line();
    }

    fn render_paragraph(&mut self, element: ElementRef<'_>, ctx: &Ctx) {
        match ctx.item_indent {
            // Inside a list item or definition: flow inline, later blocks
            // continue on their own indented line.
            Some(indent) => {
                if self.out.cursor().char_col > indent {
                    self.out.break_line();
                }
                if self.out.at_line_start() {
                    self.out.append(&" ".repeat(indent), &[]);
                }
            }
            None => self.out.break_line(),
        }
        if has_block_descendant(&element) {
            let flat = flatten_text(&element, self.link_icon(ctx));
            for (idx, line) in flat.lines().enumerate() {
                if idx > 0 {
                    self.out.newline();
                    if let Some(indent) = ctx.item_indent {
                        self.out.append(&" ".repeat(indent), &[]);
                    }
                }
                self.out.append(line, &ctx.ambient);
            }
        } else {
            self.render_children(*element, ctx);
        }
        if ctx.item_indent.is_none() {
            self.out.ensure_blank_line();
        }
    }

    fn render_container(&mut self, element: ElementRef<'_>, ctx: &Ctx) {
        let tag = element.value().name();
        let structural_root = tag.eq_ignore_ascii_case("html") || tag.eq_ignore_ascii_case("body");
        let has_text = !collect_raw_text(&element).trim().is_empty();
        if !structural_root && !has_block_child(&element) && has_text {
            self.render_paragraph(element, ctx);
        } else {
            self.render_children(*element, ctx);
        }
    }

    fn render_list(&mut self, element: ElementRef<'_>, ordered: bool, ctx: &Ctx) {
        let depth = ctx.list_depth;
        self.out.break_line();
        let mut counter = 0usize;
        for child in element.children() {
            let Some(item) = ElementRef::wrap(child) else {
                continue;
            };
            if !item.value().name().eq_ignore_ascii_case("li") {
                self.render_element(item, ctx);
                continue;
            }
            counter += 1;
            let marker = if ordered {
                format!("{counter}.")
            } else {
                LIST_BULLETS[depth % LIST_BULLETS.len()].to_string()
            };
            self.render_list_item(item, &marker, ctx);
        }
        if depth == 0 {
            self.out.ensure_blank_line();
        }
    }

    fn render_list_item(&mut self, item: ElementRef<'_>, marker: &str, ctx: &Ctx) {
        let ctx = self.scoped(&item, ctx);
        let indent = INDENT.repeat(ctx.list_depth);
        self.out.break_line();
        self.out.append(&indent, &[]);
        self.out.append(marker, &ctx.groups_with(LIST_MARKER));
        self.out.append(" ", &[]);
        let item_ctx = Ctx {
            list_depth: ctx.list_depth + 1,
            item_indent: Some(self.out.cursor().char_col),
            ..ctx.clone()
        };
        self.render_children(*item, &item_ctx);
        self.out.break_line();
    }

    fn render_definition_detail(&mut self, element: ElementRef<'_>, ctx: &Ctx) {
        self.out.break_line();
        self.out.append(INDENT, &[]);
        let detail_ctx = Ctx {
            item_indent: Some(self.out.cursor().char_col),
            ..ctx.clone()
        };
        self.render_children(*element, &detail_ctx);
        self.out.break_line();
    }

    fn render_blockquote(&mut self, element: ElementRef<'_>, ctx: &Ctx) {
        self.out.break_line();
        let flat = flatten_text(&element, self.link_icon(ctx));
        let groups = ctx.groups_with(QUOTE);
        for line in flat.lines().map(str::trim).filter(|l| !l.is_empty()) {
            self.out.append(&format!("{QUOTE_BORDER}{line}"), &groups);
            self.out.newline();
        }
        self.out.ensure_blank_line();
    }

    fn render_link(&mut self, element: ElementRef<'_>, ctx: &Ctx) {
        let href = element
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty());
        self.render_children(*element, &ctx.linked());
        if let (Some(href), Some(icon)) = (href, self.link_icon(ctx)) {
            let annotation = format!(" {icon} ({href})");
            self.out.append(&annotation, &ctx.groups_with(LINK_URL));
        }
    }

    fn render_inline_code(&mut self, element: ElementRef<'_>, ctx: &Ctx) {
        let raw = collect_raw_text(&element);
        let text = raw.replace("\r\n", " ").replace('\n', " ");
        if text.is_empty() {
            return;
        }
        self.out.append(&text, &ctx.groups_with(INLINE_CODE));
    }

    fn render_rule(&mut self, ctx: &Ctx) {
        self.out.break_line();
        let rule = RULE_GLYPH.repeat(self.options.rule_width);
        self.out.append(&rule, &ctx.groups_with(RULE));
        self.out.ensure_blank_line();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(html: &str) -> (String, Vec<HighlightSpan>) {
        let doc = Html::parse_document(html);
        let palette = StylePalette::new();
        let options = RenderOptions::default();
        let (text, spans, _) = render_tree(&doc, &palette, &options);
        (text, spans)
    }

    fn spans_for<'s>(spans: &'s [HighlightSpan], group: &str) -> Vec<&'s HighlightSpan> {
        spans.iter().filter(|s| s.hl_group == group).collect()
    }

    #[test]
    fn heading_gets_glyph_group_and_blank_line() {
        let (text, spans) = render("<h2>Title</h2><p>Body</p>");
        assert_eq!(text, "◎ Title\n\nBody\n\n");
        let header = spans_for(&spans, "SonarHeader2");
        assert_eq!(header.len(), 2);
        assert_eq!(header[0].col_start, 0);
        assert_eq!(header[1].col_end, "◎ Title".len());
    }

    #[test]
    fn whitespace_only_nodes_vanish_at_line_start() {
        let (text, _) = render("<div>\n   <p>\n  a   <b>b</b>\n  c </p>\n</div>");
        assert_eq!(text, "a b c\n\n");
    }

    #[test]
    fn ordered_lists_restart_their_counter() {
        let (text, _) =
            render("<ol><li>a</li><li>b</li></ol><ol><li>x</li><li>y</li><li>z</li></ol>");
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["1. a", "2. b", "1. x", "2. y", "3. z"]);
    }

    #[test]
    fn nested_lists_indent_and_change_bullets() {
        let (text, spans) = render("<ul><li>top<ul><li>inner</li></ul></li><li>next</li></ul>");
        assert_eq!(text, "• top\n  ◦ inner\n• next\n\n");
        assert_eq!(spans_for(&spans, LIST_MARKER).len(), 3);
    }

    #[test]
    fn paragraphs_inside_items_flow_inline() {
        let (text, _) = render("<ul><li><p>first</p><p>second</p></li></ul>");
        assert_eq!(text, "• first\n  second\n\n");
    }

    #[test]
    fn blocks_after_nested_content_return_to_item_indent() {
        let (text, _) = render("<ul><li>x<ul><li>in</li></ul><p>tail</p></li></ul>");
        assert_eq!(text, "• x\n  ◦ in\n  tail\n\n");

        let doc = Html::parse_document(
            "<ul><li><p>first</p><pre><code>x = 1</code></pre><p>second</p></li></ul>",
        );
        let (text, spans, rects) =
            render_tree(&doc, &StylePalette::new(), &RenderOptions::default());
        assert_eq!(text, "• first\n  x = 1\n\n  second\n\n");
        assert!(spans.iter().all(|s| s.lnum != 1));
        assert_eq!(rects.len(), 1);
        assert_eq!((rects[0].start_line, rects[0].col), (1, 2));
        assert_eq!(rects[0].width, Some(5));
    }

    #[test]
    fn figcaption_and_legend_render_as_paragraphs() {
        let (text, _) = render(
            "<figure><img src='a.png'><figcaption>Figure 1</figcaption></figure>\
             <fieldset><legend>Opts</legend><p>on</p></fieldset>",
        );
        assert_eq!(text, "Figure 1\n\nOpts\n\non\n\n");
    }

    #[test]
    fn links_carry_text_and_url_groups() {
        let (text, spans) = render("<p>see <a href='https://rules.test/x'>rule</a>.</p>");
        assert_eq!(text, "see rule 🔗 (https://rules.test/x).\n\n");
        let link = spans_for(&spans, LINK_TEXT);
        assert_eq!(&text[link[0].col_start..link[0].col_end], "rule");
        let url = spans_for(&spans, LINK_URL);
        assert_eq!(
            &text[url[0].col_start..url[0].col_end],
            " 🔗 (https://rules.test/x)"
        );
    }

    #[test]
    fn inline_code_keeps_inner_spacing() {
        let (text, spans) = render("<p>call <code>foo(a,  b)</code> now</p>");
        assert_eq!(text, "call foo(a,  b) now\n\n");
        let code = spans_for(&spans, INLINE_CODE);
        assert_eq!(&text[code[0].col_start..code[0].col_end], "foo(a,  b)");
    }

    #[test]
    fn blockquote_lines_get_border() {
        let (text, spans) = render("<blockquote><p>one</p><p>two</p></blockquote>");
        assert_eq!(text, "▎ one\n▎ two\n\n");
        assert_eq!(spans_for(&spans, QUOTE).len(), 2);
    }

    #[test]
    fn div_with_text_acts_as_paragraph() {
        let (text, _) =
            render("<div>alpha</div><div><div>beta</div></div><section><p>gamma</p></section>");
        assert_eq!(text, "alpha\n\nbeta\n\ngamma\n\n");
    }

    #[test]
    fn rule_and_break() {
        let (text, spans) = render("<p>a<br>b</p><hr>");
        let rule = RULE_GLYPH.repeat(40);
        assert_eq!(text, format!("a\nb\n\n{rule}\n\n"));
        assert_eq!(spans_for(&spans, RULE)[0].col_end, rule.len());
    }

    #[test]
    fn definition_lists() {
        let (text, spans) = render("<dl><dt>Term</dt><dd>Meaning</dd></dl>");
        assert_eq!(text, "Term\n  Meaning\n\n");
        assert_eq!(spans_for(&spans, DEFINITION_TERM).len(), 1);
    }

    #[test]
    fn hidden_and_image_elements_are_skipped() {
        let (text, _) = render(
            "<head><title>T</title><style>.a{}</style></head><body><p>x<img src='a.png'></p><script>var y;</script></body>",
        );
        assert_eq!(text, "x\n\n");
    }
}
