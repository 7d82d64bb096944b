//! Highlight group names, the syntax-token class table and palette
//! definition commands for the terminal host.

use anyhow::Result;
use serde::Serialize;

use crate::css::StylePalette;

pub const HEADER_GROUPS: [&str; 6] = [
    "SonarHeader1",
    "SonarHeader2",
    "SonarHeader3",
    "SonarHeader4",
    "SonarHeader5",
    "SonarHeader6",
];
pub const LINK_TEXT: &str = "SonarLinkText";
pub const LINK_URL: &str = "SonarLinkUrl";
pub const INLINE_CODE: &str = "SonarInlineCode";
pub const CODE_BLOCK: &str = "SonarCodeBlock";
pub const QUOTE: &str = "SonarQuote";
pub const TABLE_HEADER: &str = "SonarTableHeader";
pub const TABLE_BORDER: &str = "SonarTableBorder";
pub const LIST_MARKER: &str = "SonarListMarker";
pub const RULE: &str = "SonarRule";
pub const DEFINITION_TERM: &str = "SonarDefinitionTerm";
pub const DIFF_ADD: &str = "DiffAdd";
pub const DIFF_DELETE: &str = "DiffDelete";

/// Header group for a heading level; out-of-range levels clamp into 1..=6.
pub fn header_group(level: u8) -> &'static str {
    let idx = usize::from(level.clamp(1, 6)) - 1;
    HEADER_GROUPS[idx]
}

/// One colorized byte range of one line of rendered text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSpan {
    pub hl_group: String,
    /// 0-based line index.
    pub lnum: usize,
    /// 0-based UTF-8 byte offset.
    pub col_start: usize,
    /// Exclusive UTF-8 byte offset.
    pub col_end: usize,
}

impl HighlightSpan {
    pub fn new(group: impl Into<String>, lnum: usize, col_start: usize, col_end: usize) -> Self {
        Self {
            hl_group: group.into(),
            lnum,
            col_start,
            col_end,
        }
    }
}

/// Syntax-highlighter (`hljs-*`) classes and the editor group each maps to.
const TOKEN_GROUPS: &[(&str, &str)] = &[
    ("hljs-keyword", "Keyword"),
    ("hljs-built_in", "Function"),
    ("hljs-type", "Type"),
    ("hljs-literal", "Boolean"),
    ("hljs-number", "Number"),
    ("hljs-string", "String"),
    ("hljs-regexp", "String"),
    ("hljs-char", "Character"),
    ("hljs-subst", "Special"),
    ("hljs-symbol", "Special"),
    ("hljs-comment", "Comment"),
    ("hljs-doctag", "SpecialComment"),
    ("hljs-meta", "PreProc"),
    ("hljs-title", "Function"),
    ("hljs-function", "Function"),
    ("hljs-class", "Type"),
    ("hljs-params", "Identifier"),
    ("hljs-variable", "Identifier"),
    ("hljs-attr", "Identifier"),
    ("hljs-attribute", "Identifier"),
    ("hljs-property", "Identifier"),
    ("hljs-name", "Tag"),
    ("hljs-tag", "Tag"),
    ("hljs-selector-tag", "Tag"),
    ("hljs-selector-class", "Type"),
    ("hljs-selector-id", "Identifier"),
    ("hljs-operator", "Operator"),
    ("hljs-punctuation", "Delimiter"),
    ("hljs-section", "Title"),
    ("hljs-emphasis", "Italic"),
    ("hljs-strong", "Bold"),
    ("hljs-link", "Underlined"),
    ("hljs-addition", DIFF_ADD),
    ("hljs-deletion", DIFF_DELETE),
];

/// Editor group for a syntax-token class, if the class is a known token.
pub fn token_group(class: &str) -> Option<&'static str> {
    TOKEN_GROUPS
        .iter()
        .find(|(token, _)| *token == class)
        .map(|(_, group)| *group)
}

/// Terminal host boundary: receives palette definition commands.
pub trait CommandSink {
    fn command(&mut self, cmd: &str) -> Result<()>;
}

impl CommandSink for Vec<String> {
    fn command(&mut self, cmd: &str) -> Result<()> {
        self.push(cmd.to_string());
        Ok(())
    }
}

/// One `hi` command per group that carries a foreground or a background.
/// Groups with only font flags are skipped. Output is sorted by group name.
pub fn palette_commands(palette: &StylePalette) -> Vec<String> {
    palette
        .groups()
        .filter(|(_, style)| style.fg.is_some() || style.bg.is_some())
        .map(|(group, style)| {
            let mut cmd = format!("hi {group}");
            if let Some(fg) = &style.fg {
                cmd.push_str(&format!(" guifg={fg}"));
            }
            if let Some(bg) = &style.bg {
                cmd.push_str(&format!(" guibg={bg}"));
            }
            if let Some(flags) = style.gui_flags() {
                cmd.push_str(&format!(" gui={flags}"));
            }
            cmd
        })
        .collect()
}

/// Send every palette command to `sink`, stopping at the first failure.
pub fn define_palette(palette: &StylePalette, sink: &mut dyn CommandSink) -> Result<usize> {
    let commands = palette_commands(palette);
    for cmd in &commands {
        sink.command(cmd)?;
    }
    Ok(commands.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::GroupStyle;

    fn sample_palette() -> StylePalette {
        let mut palette = StylePalette::new();
        palette.insert_class(
            "warn",
            GroupStyle {
                fg: Some("#FF0000".into()),
                bg: Some("#000000".into()),
                bold: true,
                underline: true,
                ..GroupStyle::default()
            },
        );
        palette.insert_class(
            "flag-only",
            GroupStyle {
                italic: true,
                ..GroupStyle::default()
            },
        );
        palette
    }

    #[test]
    fn commands_skip_colorless_groups() {
        let commands = palette_commands(&sample_palette());
        assert_eq!(
            commands,
            vec!["hi SonarCss_warn guifg=#FF0000 guibg=#000000 gui=bold,underline".to_string()]
        );
    }

    #[test]
    fn commands_are_stable_across_calls() {
        let palette = sample_palette();
        assert_eq!(palette_commands(&palette), palette_commands(&palette));
    }

    #[test]
    fn define_palette_propagates_sink_errors() {
        struct Failing;
        impl CommandSink for Failing {
            fn command(&mut self, _cmd: &str) -> Result<()> {
                anyhow::bail!("host unavailable")
            }
        }
        assert!(define_palette(&sample_palette(), &mut Failing).is_err());
        let mut sink: Vec<String> = Vec::new();
        assert_eq!(define_palette(&sample_palette(), &mut sink).unwrap(), 1);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn token_table_lookup() {
        assert_eq!(token_group("hljs-keyword"), Some("Keyword"));
        assert_eq!(token_group("hljs-title"), Some("Function"));
        assert_eq!(token_group("hljs-unknown"), None);
        assert_eq!(header_group(9), "SonarHeader6");
    }
}
