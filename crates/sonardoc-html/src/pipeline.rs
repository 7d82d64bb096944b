use std::path::PathBuf;

use anyhow::Result;
use scraper::Html;
use serde::Serialize;
use tracing::debug;

use crate::css::{self, DEFAULT_MAX_VAR_DEPTH, StylePalette};
use crate::dom;
use crate::highlight::{CommandSink, HighlightSpan, define_palette};
use crate::render::{self, compositor};

pub const DEFAULT_RULE_WIDTH: usize = 40;
pub const DEFAULT_LINK_ICON: &str = "🔗";

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Directory relative stylesheet links resolve against.
    pub base_path: Option<PathBuf>,
    /// Width of `<hr>` rules, in characters.
    pub rule_width: usize,
    pub max_var_depth: usize,
    pub link_icon: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            base_path: None,
            rule_width: DEFAULT_RULE_WIDTH,
            max_var_depth: DEFAULT_MAX_VAR_DEPTH,
            link_icon: DEFAULT_LINK_ICON.to_string(),
        }
    }
}

/// Flat text plus the byte-addressed spans that colorize it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedText {
    pub text: String,
    pub highlights: Vec<HighlightSpan>,
}

impl RenderedText {
    pub fn line_count(&self) -> usize {
        line_count(&self.text)
    }
}

/// Resolve the document's stylesheets into a palette, define its groups on
/// `sink`, then render. Sink errors abort before any text is produced.
pub fn render_rule_html_with_css(
    html: &str,
    options: &RenderOptions,
    sink: &mut dyn CommandSink,
) -> Result<RenderedText> {
    let document = dom::parse(html);
    let palette = css::resolve_document_styles(
        &document,
        options.base_path.as_deref(),
        options.max_var_depth,
    );
    let defined = define_palette(&palette, sink)?;
    debug!(groups = defined, "palette defined");
    Ok(render_document(&document, &palette, options))
}

/// Structural rendering only: no stylesheets, no palette commands.
pub fn render_rule_html_to_text_and_highlights(html: &str) -> RenderedText {
    render_without_css(html, &RenderOptions::default())
}

pub fn render_without_css(html: &str, options: &RenderOptions) -> RenderedText {
    let document = dom::parse(html);
    render_document(&document, &StylePalette::new(), options)
}

fn render_document(
    document: &Html,
    palette: &StylePalette,
    options: &RenderOptions,
) -> RenderedText {
    let (text, mut highlights, rects) = render::render_tree(document, palette, options);
    highlights.extend(compositor::composite_rects(&text, &rects));
    let text = trim_trailing_blank_lines(text);
    compositor::discard_out_of_range(&mut highlights, line_count(&text));
    RenderedText { text, highlights }
}

// Only whole blank lines go; the last content line keeps its padding so code
// block rectangles stay intact.
fn trim_trailing_blank_lines(mut text: String) -> String {
    loop {
        match text.rfind('\n') {
            Some(idx) if text[idx + 1..].trim().is_empty() => text.truncate(idx),
            Some(_) => break,
            None => {
                if text.trim().is_empty() {
                    text.clear();
                }
                break;
            }
        }
    }
    text
}

fn line_count(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.split('\n').count()
    }
}
