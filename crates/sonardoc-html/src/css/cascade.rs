use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use lightningcss::stylesheet::{ParserOptions, StyleSheet as ParsedSheet};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::css::selector::CompiledSelector;
use crate::css::vars::VarTable;
use crate::diagnostics::diagnostics_enabled;

#[derive(Debug, Clone)]
struct Declaration {
    name: String,
    value: String,
}

#[derive(Debug, Clone)]
struct Rule {
    selector: CompiledSelector,
    declarations: Vec<Declaration>,
    specificity: u32,
    order: usize,
}

#[derive(Default)]
struct RuleIndex {
    by_id: HashMap<String, Vec<usize>>,    // id value → rule indices
    by_class: HashMap<String, Vec<usize>>, // class → rule indices
    by_tag: HashMap<String, Vec<usize>>,   // tag → rule indices
    universal: Vec<usize>,                 // rules with no key on rightmost
}

impl RuleIndex {
    fn add_keys(&mut self, idx: usize, keys: RightmostKeys) {
        let mut keyed = false;
        if let Some(id) = keys.id {
            self.by_id.entry(id).or_default().push(idx);
            keyed = true;
        }
        for class in keys.classes {
            self.by_class.entry(class).or_default().push(idx);
            keyed = true;
        }
        if let Some(tag) = keys.tag {
            self.by_tag.entry(tag).or_default().push(idx);
            keyed = true;
        }
        if !keyed {
            self.universal.push(idx);
        }
    }

    fn candidates_for(&self, el: &ElementRef) -> Vec<usize> {
        let mut set: HashSet<usize> = HashSet::new();
        if let Some(v) = el.value().attr("id").and_then(|id| self.by_id.get(id)) {
            set.extend(v);
        }
        for class in el.value().classes() {
            if let Some(v) = self.by_class.get(&class.to_ascii_lowercase()) {
                set.extend(v);
            }
        }
        if let Some(v) = self.by_tag.get(&el.value().name().to_ascii_lowercase()) {
            set.extend(v);
        }
        set.extend(self.universal.iter().copied());
        let mut candidates: Vec<usize> = set.into_iter().collect();
        candidates.sort_unstable();
        candidates
    }
}

/// Rules gathered from every stylesheet referenced by a document, plus the
/// `:root` custom-property table.
pub struct StyleSheet {
    rules: Vec<Rule>,
    index: RuleIndex,
    root_vars: VarTable,
}

impl StyleSheet {
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            index: RuleIndex::default(),
            root_vars: VarTable::new(),
        }
    }

    /// Build from raw CSS sources, in order. Custom properties are read from
    /// `:root` rules only. When the combined text does not parse as a whole
    /// the variable table is left empty; individual rules still apply.
    pub fn from_sources(sources: &[String]) -> Self {
        let mut sheet = StyleSheet::empty();
        let mut order = 0usize;
        for css in sources {
            for (selectors, body) in split_rules(css) {
                let declarations = parse_declarations(&body);
                if declarations.is_empty() {
                    continue;
                }
                if selectors.contains(":root") {
                    for decl in declarations.iter().filter(|d| d.name.starts_with("--")) {
                        sheet
                            .root_vars
                            .insert(decl.name.clone(), decl.value.clone());
                    }
                }
                let Some(selector) = CompiledSelector::parse(&selectors) else {
                    continue;
                };
                order += 1;
                let idx = sheet.rules.len();
                sheet.index.add_keys(idx, rightmost_keys(&selectors));
                sheet.rules.push(Rule {
                    specificity: selector.specificity(),
                    selector,
                    declarations,
                    order,
                });
            }
        }

        let combined = sources.join("\n");
        if !combined.trim().is_empty() && !parses_cleanly(&combined) {
            debug!("combined stylesheet failed to parse; ignoring custom properties");
            sheet.root_vars.clear();
        }
        if diagnostics_enabled("css") {
            info!(
                sources = sources.len(),
                rules = sheet.rules.len(),
                vars = sheet.root_vars.len(),
                "diagnostics: stylesheet built"
            );
        }
        sheet
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn root_vars(&self) -> &VarTable {
        &self.root_vars
    }

    /// Effective declarations for an element: matched rules ordered by
    /// `(specificity, source order)`, then the element's own `style`
    /// attribute on top. Values are raw; `var()` is not resolved here.
    pub fn computed_declarations(
        &self,
        el: &ElementRef,
        inline: Option<&str>,
    ) -> BTreeMap<String, String> {
        let mut winners: HashMap<String, (u32, usize, String)> = HashMap::new();
        for idx in self.index.candidates_for(el) {
            let rule = &self.rules[idx];
            if !rule.selector.matches(el) {
                continue;
            }
            for decl in &rule.declarations {
                let prio = (rule.specificity, rule.order);
                let should_set = match winners.get(&decl.name) {
                    Some(existing) => prio_gt(&prio, &(existing.0, existing.1)),
                    None => true,
                };
                if should_set {
                    winners.insert(
                        decl.name.clone(),
                        (rule.specificity, rule.order, decl.value.clone()),
                    );
                }
            }
        }

        if let Some(inline_raw) = inline {
            for decl in parse_declarations(inline_raw) {
                winners.insert(decl.name, (u32::MAX, usize::MAX, decl.value));
            }
        }

        winners
            .into_iter()
            .map(|(name, (_s, _o, value))| (name, value))
            .collect()
    }
}

fn prio_gt(a: &(u32, usize), b: &(u32, usize)) -> bool {
    if a.0 != b.0 {
        return a.0 > b.0;
    }
    a.1 > b.1
}

fn parses_cleanly(css: &str) -> bool {
    ParsedSheet::parse(css, ParserOptions::default()).is_ok()
}

// Minimal CSS block splitter: yields (selectors, body)
fn split_rules(css: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let commented = strip_css_comments(css);
    let source = strip_at_blocks(&commented);
    for raw in source.split('}') {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((sel, body)) = trimmed.split_once('{') {
            let sel = sel.trim();
            let body = body.trim();
            if !sel.is_empty() && !body.is_empty() {
                out.push((sel.to_string(), body.to_string()));
            }
        }
    }
    out
}

fn strip_css_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_comment = false;
    while let Some(ch) = chars.next() {
        if in_comment {
            if ch == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_comment = false;
            }
        } else if ch == '/' && chars.peek() == Some(&'*') {
            chars.next();
            in_comment = true;
        } else {
            out.push(ch);
        }
    }
    out
}

// Media queries are not evaluated: `@media`, `@supports`, `@keyframes` and
// friends are skipped with their whole balanced block. `@import`/`@charset`
// statements end at the next ';'.
fn strip_at_blocks(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        let brace = tail.find('{');
        let semi = tail.find(';');
        match (brace, semi) {
            (Some(b), Some(s)) if s < b => rest = &tail[s + 1..],
            (None, Some(s)) => rest = &tail[s + 1..],
            (Some(b), _) => {
                let mut depth = 0i32;
                let mut end = tail.len();
                for (idx, ch) in tail[b..].char_indices() {
                    match ch {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                end = b + idx + 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                rest = &tail[end..];
            }
            (None, None) => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn parse_declarations(source: &str) -> Vec<Declaration> {
    source
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                return None;
            }
            // Custom property names are case-sensitive.
            let name = if name.starts_with("--") {
                name.to_string()
            } else {
                name.to_ascii_lowercase()
            };
            Some(Declaration {
                name,
                value: value.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Default, PartialEq)]
struct RightmostKeys {
    id: Option<String>,
    classes: Vec<String>,
    tag: Option<String>,
}

// Index keys come from the rightmost compound of the first selector only
// when the prelude holds a single selector; lists go to the universal bucket.
fn rightmost_keys(selector_text: &str) -> RightmostKeys {
    if selector_text.contains(',') {
        return RightmostKeys::default();
    }
    let segment = selector_text
        .rsplit(|c: char| c.is_whitespace() || c == '>' || c == '+' || c == '~')
        .next()
        .unwrap_or(selector_text)
        .trim();
    let mut keys = RightmostKeys::default();
    let mut chars = segment.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            '.' => {
                chars.next();
                let class = read_ident(&mut chars);
                if !class.is_empty() {
                    keys.classes.push(class.to_ascii_lowercase());
                }
            }
            '#' => {
                chars.next();
                let id = read_ident(&mut chars);
                if !id.is_empty() {
                    keys.id = Some(id);
                }
            }
            ':' => {
                chars.next();
                read_ident(&mut chars);
                if chars.peek() == Some(&'(') {
                    let mut depth = 0;
                    for c in chars.by_ref() {
                        match c {
                            '(' => depth += 1,
                            ')' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            '[' => {
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                }
            }
            c if keys.tag.is_none() && (c.is_alphabetic() || c == '_') => {
                let tag = read_ident(&mut chars);
                keys.tag = Some(tag.to_ascii_lowercase());
            }
            _ => {
                chars.next();
            }
        }
    }
    keys
}

fn read_ident(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut buf = String::new();
    while let Some(&n) = chars.peek() {
        if n.is_alphanumeric() || n == '-' || n == '_' {
            buf.push(n);
            chars.next();
        } else {
            break;
        }
    }
    buf
}

/// Collect CSS text from `<style>` blocks and `<link rel="stylesheet">`
/// targets, in document order. Unreadable links contribute nothing.
pub fn collect_stylesheet_sources(document: &Html, base_path: Option<&Path>) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    let Ok(selector) = Selector::parse("style, link") else {
        return sources;
    };
    for node in document.select(&selector) {
        let el = node.value();
        if el.name().eq_ignore_ascii_case("style") {
            let css = node.text().collect::<String>();
            if !css.trim().is_empty() {
                sources.push(css);
            }
            continue;
        }
        let rel = el.attr("rel").unwrap_or("").to_ascii_lowercase();
        if !rel.split_whitespace().any(|r| r == "stylesheet") {
            continue;
        }
        let Some(href) = el.attr("href") else {
            continue;
        };
        if let Some(css) = read_stylesheet_link(href, base_path) {
            sources.push(css);
        }
    }
    sources
}

fn read_stylesheet_link(href: &str, base_path: Option<&Path>) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        if url.scheme() == "file" {
            let path = url.to_file_path().ok()?;
            return read_css_file(&path);
        }
        // Windows drive letters parse as a one-letter scheme.
        if url.scheme().len() > 1 {
            if diagnostics_enabled("css") {
                info!(href = %href, "diagnostics: skipped remote stylesheet link");
            }
            return None;
        }
    }
    let path = match base_path {
        Some(base) => base.join(trimmed),
        None => Path::new(trimmed).to_path_buf(),
    };
    read_css_file(&path)
}

fn read_css_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(css) => Some(css),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "skipping unreadable stylesheet");
            None
        }
    }
}
