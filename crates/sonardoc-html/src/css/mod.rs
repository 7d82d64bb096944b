//! CSS resolution: stylesheet collection, cascade, `var()` chains and color
//! normalization, producing the class-to-group palette used by the walker.

pub mod cascade;
pub mod color;
pub mod palette;
pub mod selector;
pub mod vars;

use std::path::Path;

use scraper::Html;

pub use cascade::{StyleSheet, collect_stylesheet_sources};
pub use color::normalize_css_color_to_hex;
pub use palette::{GroupStyle, StylePalette, group_name_for_class};
pub use vars::{DEFAULT_MAX_VAR_DEPTH, VarTable, resolve_var_refs};

/// Build the palette for a parsed document from its `<style>` blocks, its
/// linked stylesheets (relative to `base_path`) and inline `style` attributes.
pub fn resolve_document_styles(
    document: &Html,
    base_path: Option<&Path>,
    max_var_depth: usize,
) -> StylePalette {
    let sources = collect_stylesheet_sources(document, base_path);
    let sheet = StyleSheet::from_sources(&sources);
    palette::resolve_palette(document, &sheet, max_var_depth)
}
