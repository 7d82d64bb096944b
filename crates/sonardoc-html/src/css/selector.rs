//! Selector matching through Servo's `selectors` crate over `scraper` elements.
//!
//! Only the subset a rule-description stylesheet needs is wired up: type, id,
//! class and attribute selectors plus descendant/child/sibling combinators.
//! Pseudo-classes and pseudo-elements never match.

use cssparser::{CssStringWriter, Parser as CssParser, ParserInput, ToCss, serialize_identifier};
use scraper::ElementRef;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{
    ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode,
    NeedsSelectorFlags, matches_selector_list,
};
use selectors::parser::{
    ParseRelative, Parser as SelParser, SelectorImpl, SelectorList, SelectorParseErrorKind,
};
use selectors::{Element, NthIndexCache, OpaqueElement, context::QuirksMode};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CssIdent(pub String);

impl AsRef<str> for CssIdent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for CssIdent {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for CssIdent {
    fn from(s: &'a str) -> Self {
        Self(s.to_owned())
    }
}

impl ToCss for CssIdent {
    fn to_css<W>(&self, dest: &mut W) -> std::fmt::Result
    where
        W: std::fmt::Write,
    {
        serialize_identifier(&self.0, dest)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CssAttrValue(pub String);

impl AsRef<str> for CssAttrValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for CssAttrValue {
    fn from(s: &'a str) -> Self {
        Self(s.to_owned())
    }
}

impl ToCss for CssAttrValue {
    fn to_css<W>(&self, dest: &mut W) -> std::fmt::Result
    where
        W: std::fmt::Write,
    {
        use std::fmt::Write;
        write!(CssStringWriter::new(dest), "{}", &self.0)
    }
}

#[derive(Clone, Debug)]
pub enum RuleSelectorImpl {}

impl SelectorImpl for RuleSelectorImpl {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssAttrValue;
    type Identifier = CssIdent;
    type LocalName = CssIdent;
    type NamespaceUrl = CssIdent;
    type NamespacePrefix = CssIdent;
    type BorrowedNamespaceUrl = str;
    type BorrowedLocalName = str;
    type NonTSPseudoClass = Unsupported;
    type PseudoElement = Unsupported;
}

/// Uninhabited pseudo type: no pseudo-class or pseudo-element ever parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsupported {}

impl ToCss for Unsupported {
    fn to_css<W>(&self, _dest: &mut W) -> std::fmt::Result
    where
        W: std::fmt::Write,
    {
        Ok(())
    }
}

impl selectors::parser::NonTSPseudoClass for Unsupported {
    type Impl = RuleSelectorImpl;
    fn is_active_or_hover(&self) -> bool {
        false
    }
    fn is_user_action_state(&self) -> bool {
        false
    }
}

impl selectors::parser::PseudoElement for Unsupported {
    type Impl = RuleSelectorImpl;
}

struct RuleSelectorParser;

impl<'i> SelParser<'i> for RuleSelectorParser {
    type Impl = RuleSelectorImpl;
    type Error = SelectorParseErrorKind<'i>;
}

/// A parsed selector list from one rule prelude.
#[derive(Clone, Debug)]
pub struct CompiledSelector(SelectorList<RuleSelectorImpl>);

impl CompiledSelector {
    pub fn parse(input: &str) -> Option<Self> {
        let mut input = ParserInput::new(input);
        let mut parser = CssParser::new(&mut input);
        SelectorList::parse(&RuleSelectorParser, &mut parser, ParseRelative::No)
            .ok()
            .map(Self)
    }

    pub fn matches(&self, element: &ElementRef<'_>) -> bool {
        let mut cache = NthIndexCache::default();
        let mut ctx = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        matches_selector_list(&self.0, &MatchElement(*element), &mut ctx)
    }

    /// Highest specificity among the selectors of the list.
    pub fn specificity(&self) -> u32 {
        let selectors = &self.0.0;
        selectors
            .iter()
            .map(|sel| sel.specificity())
            .max()
            .unwrap_or(0)
    }
}

/// `selectors::Element` view over a `scraper` element.
#[derive(Clone, Debug)]
struct MatchElement<'a>(ElementRef<'a>);

impl<'a> Element for MatchElement<'a> {
    type Impl = RuleSelectorImpl;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(&self.0)
    }

    fn parent_element(&self) -> Option<Self> {
        self.0.parent().and_then(ElementRef::wrap).map(MatchElement)
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.0
            .prev_siblings()
            .find(|sib| sib.value().is_element())
            .and_then(ElementRef::wrap)
            .map(MatchElement)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.0
            .next_siblings()
            .find(|sib| sib.value().is_element())
            .and_then(ElementRef::wrap)
            .map(MatchElement)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.0
            .children()
            .find(|child| child.value().is_element())
            .and_then(ElementRef::wrap)
            .map(MatchElement)
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &<Self::Impl as SelectorImpl>::BorrowedLocalName) -> bool {
        self.0.value().name().eq_ignore_ascii_case(name)
    }

    fn has_namespace(&self, _ns: &<Self::Impl as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
        true
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.0
            .value()
            .name()
            .eq_ignore_ascii_case(other.0.value().name())
    }

    fn attr_matches(
        &self,
        _ns: &NamespaceConstraint<&<Self::Impl as SelectorImpl>::NamespaceUrl>,
        local_name: &<Self::Impl as SelectorImpl>::LocalName,
        operation: &AttrSelectorOperation<&<Self::Impl as SelectorImpl>::AttrValue>,
    ) -> bool {
        self.0
            .value()
            .attr(local_name.as_ref())
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &<Self::Impl as SelectorImpl>::NonTSPseudoClass,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &<Self::Impl as SelectorImpl>::PseudoElement,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.0.value().name().eq_ignore_ascii_case("a") && self.0.value().attr("href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn imported_part(
        &self,
        _name: &<Self::Impl as SelectorImpl>::Identifier,
    ) -> Option<<Self::Impl as SelectorImpl>::Identifier> {
        None
    }

    fn is_part(&self, _name: &<Self::Impl as SelectorImpl>::Identifier) -> bool {
        false
    }

    fn has_id(&self, id: &<Self::Impl as SelectorImpl>::Identifier, case: CaseSensitivity) -> bool {
        let Some(value) = self.0.value().attr("id") else {
            return false;
        };
        match case {
            CaseSensitivity::CaseSensitive => value == id.as_ref(),
            CaseSensitivity::AsciiCaseInsensitive => value.eq_ignore_ascii_case(id.as_ref()),
        }
    }

    fn has_class(
        &self,
        name: &<Self::Impl as SelectorImpl>::Identifier,
        case: CaseSensitivity,
    ) -> bool {
        let needle = name.as_ref();
        self.0.value().classes().any(|c| match case {
            CaseSensitivity::CaseSensitive => c == needle,
            CaseSensitivity::AsciiCaseInsensitive => c.eq_ignore_ascii_case(needle),
        })
    }

    fn is_empty(&self) -> bool {
        self.0.children().next().is_none()
    }

    fn is_root(&self) -> bool {
        self.parent_element().is_none()
    }
}
