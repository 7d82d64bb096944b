//! Render rule-description HTML into terminal text with byte-addressed
//! highlight spans, resolving stylesheet colors into highlight groups.

pub mod css;
pub mod diagnostics;
pub mod dom;
pub mod highlight;
pub mod pipeline;
pub mod render;

pub use css::{GroupStyle, StylePalette, normalize_css_color_to_hex};
pub use highlight::{CommandSink, HighlightSpan, define_palette, palette_commands};
pub use pipeline::{
    RenderOptions, RenderedText, render_rule_html_to_text_and_highlights,
    render_rule_html_with_css, render_without_css,
};
