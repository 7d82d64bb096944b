use std::ops::Deref;
use std::sync::{Mutex, OnceLock};

use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::info;

use crate::diagnostics::diagnostics_enabled;

/// Class marking a `pre` (or one of its descendants) as a diff listing.
pub const DIFF_CONTAINER_CLASS: &str = "code-difference-container";
pub const DIFF_ADDED_CLASS: &str = "code-added";
pub const DIFF_REMOVED_CLASS: &str = "code-removed";

/// Parse an HTML string (fragment or full document). html5ever recovers from
/// malformed input, so this never fails.
pub fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

pub fn find_body(document: &Html) -> Option<ElementRef<'_>> {
    let selector = Selector::parse("body").ok()?;
    document.select(&selector).next()
}

/// Structural category of an element, used by the tree walker for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Heading(u8),
    Paragraph,
    List { ordered: bool },
    DefinitionList,
    DefinitionTerm,
    DefinitionDetail,
    Table,
    CodeBlock,
    DiffBlock,
    Blockquote,
    Link,
    InlineCode,
    Break,
    Rule,
    Image,
    Container,
    Inline,
    Hidden,
}

pub fn classify(element: &ElementRef<'_>) -> ElementKind {
    let tag = element.value().name().to_ascii_lowercase();
    match tag.as_str() {
        "h1" => ElementKind::Heading(1),
        "h2" => ElementKind::Heading(2),
        "h3" => ElementKind::Heading(3),
        "h4" => ElementKind::Heading(4),
        "h5" => ElementKind::Heading(5),
        "h6" => ElementKind::Heading(6),
        "p" | "figcaption" | "legend" | "caption" | "summary" => ElementKind::Paragraph,
        "ul" | "menu" => ElementKind::List { ordered: false },
        "ol" => ElementKind::List { ordered: true },
        "dl" => ElementKind::DefinitionList,
        "dt" => ElementKind::DefinitionTerm,
        "dd" => ElementKind::DefinitionDetail,
        "table" => ElementKind::Table,
        "pre" => {
            if is_diff_block(element) {
                ElementKind::DiffBlock
            } else {
                ElementKind::CodeBlock
            }
        }
        "blockquote" => ElementKind::Blockquote,
        "a" => ElementKind::Link,
        "code" | "kbd" | "samp" | "tt" => ElementKind::InlineCode,
        "br" => ElementKind::Break,
        "hr" => ElementKind::Rule,
        "img" | "picture" | "svg" | "video" | "audio" | "canvas" => ElementKind::Image,
        "head" | "title" | "script" | "style" | "link" | "meta" | "template" | "noscript" => {
            ElementKind::Hidden
        }
        "span" | "strong" | "b" | "em" | "i" | "u" | "s" | "small" | "mark" | "abbr" | "sub"
        | "sup" | "q" | "cite" | "var" | "time" | "label" | "del" | "ins" | "font" => {
            ElementKind::Inline
        }
        "html" | "body" | "div" | "section" | "article" | "main" | "header" | "footer" | "nav"
        | "aside" | "figure" | "fieldset" | "form" | "details" | "address" | "li" | "thead"
        | "tbody" | "tfoot" | "tr" | "td" | "th" => ElementKind::Container,
        other => {
            if is_block_tag(other) {
                log_fallback_tag_once(other, "Container");
                ElementKind::Container
            } else {
                log_fallback_tag_once(other, "Inline");
                ElementKind::Inline
            }
        }
    }
}

pub fn is_block_tag(tag: &str) -> bool {
    matches!(
        &tag.to_ascii_lowercase()[..],
        "html"
            | "body"
            | "div"
            | "p"
            | "ul"
            | "ol"
            | "menu"
            | "li"
            | "dl"
            | "dt"
            | "dd"
            | "table"
            | "thead"
            | "tbody"
            | "tfoot"
            | "tr"
            | "td"
            | "th"
            | "caption"
            | "pre"
            | "blockquote"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "hr"
            | "section"
            | "article"
            | "main"
            | "header"
            | "footer"
            | "nav"
            | "aside"
            | "figure"
            | "figcaption"
            | "fieldset"
            | "legend"
            | "form"
            | "details"
            | "summary"
            | "address"
    )
}

pub fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn is_diff_block(pre: &ElementRef<'_>) -> bool {
    has_class(pre, DIFF_CONTAINER_CLASS)
        || find_descendant_with_class(pre, DIFF_CONTAINER_CLASS).is_some()
}

pub fn find_descendant_with_class<'a>(
    element: &ElementRef<'a>,
    class: &str,
) -> Option<ElementRef<'a>> {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| has_class(el, class))
}

pub fn has_block_child(element: &ElementRef<'_>) -> bool {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .any(|el| is_block_tag(el.value().name()))
}

pub fn has_block_descendant(element: &ElementRef<'_>) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|el| is_block_tag(el.value().name()))
}

pub fn collect_raw_text(node: &NodeRef<'_, Node>) -> String {
    match node.value() {
        Node::Text(text) => text.deref().to_string(),
        _ => {
            let mut content = String::new();
            for child in node.children() {
                content.push_str(&collect_raw_text(&child));
            }
            content
        }
    }
}

/// Collapse every run of whitespace into a single space. Leading and
/// trailing runs are kept (as one space each).
pub fn collapse_whitespace(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut prev_was_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}

pub fn normalize_whitespace(input: &str) -> String {
    collapse_whitespace(input).trim().to_string()
}

/// Flatten an element into plain text lines. Block-level descendants and
/// `<br>` start new lines; whitespace inside each line is collapsed. Links
/// get a trailing `<icon> (href)` annotation unless they sit inside another
/// link, so nested anchors never repeat their target.
pub fn flatten_text(element: &ElementRef<'_>, link_icon: Option<&str>) -> String {
    let mut raw = String::new();
    flatten_into(**element, &mut raw, link_icon, false);
    let lines: Vec<String> = raw
        .split('\n')
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n")
}

fn flatten_into(node: NodeRef<'_, Node>, out: &mut String, link_icon: Option<&str>, in_link: bool) {
    match node.value() {
        Node::Text(text) => out.push_str(text.deref()),
        Node::Element(element) => {
            let tag = element.name().to_ascii_lowercase();
            match tag.as_str() {
                "br" => out.push('\n'),
                "script" | "style" | "head" | "template" => {}
                "a" => {
                    for child in node.children() {
                        flatten_into(child, out, link_icon, true);
                    }
                    if let (Some(icon), false) = (link_icon, in_link)
                        && let Some(href) = element.attr("href").map(str::trim)
                        && !href.is_empty()
                    {
                        out.push_str(&format!(" {icon} ({href})"));
                    }
                }
                _ => {
                    let block = is_block_tag(&tag);
                    if block {
                        out.push('\n');
                    }
                    for child in node.children() {
                        flatten_into(child, out, link_icon, in_link);
                    }
                    if block {
                        out.push('\n');
                    }
                }
            }
        }
        _ => {
            for child in node.children() {
                flatten_into(child, out, link_icon, in_link);
            }
        }
    }
}

fn log_fallback_tag_once(tag: &str, fallback: &str) {
    static SEEN: OnceLock<Mutex<std::collections::HashSet<String>>> = OnceLock::new();
    if !diagnostics_enabled("html") {
        return;
    }
    let set = SEEN.get_or_init(|| Mutex::new(std::collections::HashSet::new()));
    if let Ok(mut guard) = set.lock()
        && guard.insert(tag.to_string())
    {
        info!(tag = %tag, fallback = %fallback, "diagnostics: unsupported tag fell back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    #[test]
    fn classifies_structural_tags() {
        let doc = parse(
            "<h3>t</h3><ol><li>a</li></ol><pre><code>x</code></pre>\
             <pre class='code-difference-container'><div class='code-added'>y</div></pre>",
        );
        assert_eq!(classify(&first(&doc, "h3")), ElementKind::Heading(3));
        assert_eq!(
            classify(&first(&doc, "ol")),
            ElementKind::List { ordered: true }
        );
        assert_eq!(classify(&first(&doc, "pre")), ElementKind::CodeBlock);
        assert_eq!(
            classify(&first(&doc, "pre.code-difference-container")),
            ElementKind::DiffBlock
        );
        assert_eq!(classify(&first(&doc, "code")), ElementKind::InlineCode);
    }

    #[test]
    fn diff_container_may_be_nested_inside_pre() {
        let doc = parse(
            "<pre><code class='code-difference-container'>\
             <div class='code-removed'>a</div></code></pre>",
        );
        assert_eq!(classify(&first(&doc, "pre")), ElementKind::DiffBlock);
    }

    #[test]
    fn whitespace_collapses_but_keeps_edges() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), " a b ");
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
    }

    #[test]
    fn flatten_splits_blocks_and_annotates_links() {
        let doc = parse(
            "<blockquote><p>one <a href='https://x.test'>x</a></p>\
             <p>two <br>three</p></blockquote>",
        );
        let quote = first(&doc, "blockquote");
        let flat = flatten_text(&quote, Some("@"));
        let lines: Vec<&str> = flat.lines().collect();
        assert_eq!(lines, vec!["one x @ (https://x.test)", "two", "three"]);
        assert_eq!(flatten_text(&quote, None).lines().next(), Some("one x"));
    }

    #[test]
    fn block_descendant_detection() {
        let doc = parse(
            "<div id='a'><span>x<em>y</em></span></div><div id='b'><span><p>z</p></span></div>",
        );
        assert!(!has_block_descendant(&first(&doc, "#a")));
        assert!(has_block_descendant(&first(&doc, "#b")));
        assert!(!has_block_child(&first(&doc, "#b")));
    }
}
