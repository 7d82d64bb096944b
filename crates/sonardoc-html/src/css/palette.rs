use std::collections::{BTreeMap, HashMap};

use scraper::{Html, Selector};
use tracing::info;

use crate::css::cascade::StyleSheet;
use crate::css::color::{normalize_css_color_to_hex, strip_important};
use crate::css::vars::resolve_var_refs;
use crate::diagnostics::diagnostics_enabled;

/// Prefix for every group synthesized from a CSS class.
pub const CSS_GROUP_PREFIX: &str = "SonarCss_";

/// Resolved terminal style for one highlight group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupStyle {
    pub fg: Option<String>,
    pub bg: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl GroupStyle {
    pub fn is_empty(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && !self.bold && !self.italic && !self.underline
    }

    /// `bold,italic,underline` subset in that order, or `None` when plain.
    pub fn gui_flags(&self) -> Option<String> {
        let flags: Vec<&str> = [
            (self.bold, "bold"),
            (self.italic, "italic"),
            (self.underline, "underline"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if flags.is_empty() {
            None
        } else {
            Some(flags.join(","))
        }
    }
}

/// Class-to-group map plus the style of each group, built for one render.
#[derive(Debug, Clone, Default)]
pub struct StylePalette {
    class_groups: HashMap<String, String>,
    group_styles: BTreeMap<String, GroupStyle>,
}

impl StylePalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.class_groups.is_empty()
    }

    pub fn group_for_class(&self, class: &str) -> Option<&str> {
        self.class_groups.get(class).map(String::as_str)
    }

    /// Groups in name order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &GroupStyle)> {
        self.group_styles
            .iter()
            .map(|(name, style)| (name.as_str(), style))
    }

    /// Record `style` for `class` unless the class already has one.
    /// Returns whether the entry was inserted.
    pub fn insert_class(&mut self, class: &str, style: GroupStyle) -> bool {
        if style.is_empty() || self.class_groups.contains_key(class) {
            return false;
        }
        let group = group_name_for_class(class);
        self.group_styles.entry(group.clone()).or_insert(style);
        self.class_groups.insert(class.to_string(), group);
        true
    }
}

/// `SonarCss_` followed by the class with every non-word character replaced
/// by `_`.
pub fn group_name_for_class(class: &str) -> String {
    let sanitized: String = class
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{CSS_GROUP_PREFIX}{sanitized}")
}

/// Walk every element carrying a `class` in document order and record the
/// first non-empty style seen for each of its classes.
pub fn resolve_palette(document: &Html, sheet: &StyleSheet, max_var_depth: usize) -> StylePalette {
    let mut palette = StylePalette::new();
    let Ok(selector) = Selector::parse("[class]") else {
        return palette;
    };
    let mut styled_elements = 0usize;
    for el in document.select(&selector) {
        let inline = el.value().attr("style");
        if sheet.is_empty() && inline.is_none() {
            continue;
        }
        let decls = sheet.computed_declarations(&el, inline);
        if decls.is_empty() {
            continue;
        }
        let style = style_from_declarations(&decls, sheet, max_var_depth);
        if style.is_empty() {
            continue;
        }
        styled_elements += 1;
        for class in el.value().classes() {
            palette.insert_class(class, style.clone());
        }
    }
    if diagnostics_enabled("css") {
        info!(
            elements = styled_elements,
            groups = palette.group_styles.len(),
            "diagnostics: palette resolved"
        );
    }
    palette
}

fn style_from_declarations(
    decls: &BTreeMap<String, String>,
    sheet: &StyleSheet,
    max_var_depth: usize,
) -> GroupStyle {
    let resolve = |raw: &str| -> Option<String> {
        resolve_var_refs(strip_important(raw), sheet.root_vars(), max_var_depth)
    };
    let fg = decls
        .get("color")
        .and_then(|raw| resolve(raw.as_str()))
        .and_then(|value| normalize_css_color_to_hex(&value));
    let bg = decls
        .get("background-color")
        .and_then(|raw| resolve(raw.as_str()))
        .and_then(|value| normalize_css_color_to_hex(&value))
        .or_else(|| {
            decls
                .get("background")
                .and_then(|raw| resolve(raw.as_str()))
                .and_then(|value| first_color_token(&value))
        });
    let bold = decls
        .get("font-weight")
        .and_then(|raw| resolve(raw.as_str()))
        .is_some_and(|value| is_bold(&value));
    let italic = decls
        .get("font-style")
        .and_then(|raw| resolve(raw.as_str()))
        .is_some_and(|value| {
            let value = value.to_ascii_lowercase();
            value.starts_with("italic") || value.starts_with("oblique")
        });
    let underline = ["text-decoration", "text-decoration-line"]
        .iter()
        .filter_map(|name| decls.get(*name))
        .filter_map(|raw| resolve(raw.as_str()))
        .any(|value| value.to_ascii_lowercase().contains("underline"));
    GroupStyle {
        fg,
        bg,
        bold,
        italic,
        underline,
    }
}

fn is_bold(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "bold" | "bolder" => true,
        other => other.parse::<u32>().is_ok_and(|weight| weight >= 600),
    }
}

// `background` shorthand: the first token that normalizes to a color. Tokens
// are split on whitespace outside parentheses so `rgb(1, 2, 3)` stays whole.
fn first_color_token(value: &str) -> Option<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for ch in value.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth -= 1;
                current.push(ch);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
        .iter()
        .find_map(|token| normalize_css_color_to_hex(token.trim_end_matches(',')))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette_for(html: &str, css: &str) -> StylePalette {
        let doc = Html::parse_document(html);
        let sheet = StyleSheet::from_sources(&[css.to_string()]);
        resolve_palette(&doc, &sheet, 8)
    }

    #[test]
    fn group_names_replace_non_word_characters() {
        assert_eq!(group_name_for_class("hl-key.word"), "SonarCss_hl_key_word");
        assert_eq!(group_name_for_class("plain_1"), "SonarCss_plain_1");
    }

    #[test]
    fn resolves_colors_through_root_variables() {
        let palette = palette_for(
            "<span class='kw'>x</span>",
            ":root { --accent: #ABC; } .kw { color: var(--accent) !important; font-weight: 700 }",
        );
        let group = palette.group_for_class("kw").unwrap();
        assert_eq!(group, "SonarCss_kw");
        let (_, style) = palette.groups().next().unwrap();
        assert_eq!(style.fg.as_deref(), Some("#AABBCC"));
        assert!(style.bold);
        assert_eq!(style.gui_flags().as_deref(), Some("bold"));
    }

    #[test]
    fn earliest_element_wins_for_conflicting_class() {
        let palette = palette_for(
            "<span class='x' style='color: red'>a</span>\
             <span class='x' style='color: blue'>b</span>",
            "",
        );
        let (_, style) = palette.groups().next().unwrap();
        assert_eq!(style.fg.as_deref(), Some("#FF0000"));
    }

    #[test]
    fn background_shorthand_uses_first_color_token() {
        let palette = palette_for(
            "<div class='box'>x</div>",
            ".box { background: url(x.png) no-repeat rgb(0, 0, 255) }",
        );
        let (_, style) = palette.groups().next().unwrap();
        assert_eq!(style.bg.as_deref(), Some("#0000FF"));
        assert_eq!(style.fg, None);
    }

    #[test]
    fn transparent_only_styles_create_no_group() {
        let palette = palette_for(
            "<span class='ghost'>x</span>",
            ".ghost { color: transparent; background-color: rgba(0,0,0,0) }",
        );
        assert!(palette.is_empty());
        assert!(palette.group_for_class("ghost").is_none());
    }

    #[test]
    fn font_flags() {
        assert!(is_bold("bolder"));
        assert!(is_bold("600"));
        assert!(!is_bold("500"));
        let palette = palette_for(
            "<em class='e'>x</em>",
            ".e { font-style: oblique 10deg; text-decoration: underline dotted }",
        );
        let (_, style) = palette.groups().next().unwrap();
        assert_eq!(style.gui_flags().as_deref(), Some("italic,underline"));
    }
}
