use scraper::{ElementRef, Html, Node, Selector};

use crate::error::SelectorError;
use crate::models::SelectorType;
use crate::xpath::{XPath, XPathMatch};

/// Prefix that marks a container selector as XPath
pub const XPATH_PREFIX: &str = "xpath:";

const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// One match of a selector: an element, or a string produced by an XPath
/// `text()` / `@attr` terminal
#[derive(Debug, Clone)]
pub enum Match<'a> {
    Element(ElementRef<'a>),
    Value(String),
}

impl Match<'_> {
    /// Attribute value or visible text, trimmed; `None` when nothing is left
    pub fn value(&self, attribute: Option<&str>) -> Option<String> {
        match (self, attribute) {
            (Match::Element(element), Some(attr)) => element
                .value()
                .attr(attr)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            (Match::Element(element), None) => visible_text(*element),
            (Match::Value(value), _) => {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
        }
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
            }
            Node::Element(el) => {
                if INVISIBLE_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Text a reader would see, whitespace collapsed
pub fn visible_text(element: ElementRef<'_>) -> Option<String> {
    let mut raw = String::new();
    push_text(element, &mut raw);
    let text = collapse_whitespace(&raw);
    (!text.is_empty()).then_some(text)
}

fn is_self_selector(selector: &str) -> bool {
    matches!(selector.trim(), "." | ":scope")
}

pub fn parse_css(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError::new(selector, SelectorType::Css, e.to_string()))
}

/// Resolves `selector` relative to `node`
pub fn resolve<'a>(
    node: ElementRef<'a>,
    selector: &str,
    selector_type: SelectorType,
) -> Result<Vec<Match<'a>>, SelectorError> {
    match selector_type {
        SelectorType::Css => {
            if is_self_selector(selector) {
                return Ok(vec![Match::Element(node)]);
            }
            let parsed = parse_css(selector)?;
            Ok(node.select(&parsed).map(Match::Element).collect())
        }
        SelectorType::Xpath => {
            let xpath = XPath::compile(selector)
                .map_err(|e| SelectorError::new(selector, SelectorType::Xpath, e))?;
            Ok(xpath
                .evaluate(node)
                .into_iter()
                .map(|m| match m {
                    XPathMatch::Element(e) => Match::Element(e),
                    XPathMatch::Text(t) => Match::Value(t),
                })
                .collect())
        }
    }
}

/// Container elements for a record selector; `xpath:` switches to XPath
pub fn select_containers<'a>(document: &'a Html, selector: &str) -> Result<Vec<ElementRef<'a>>, SelectorError> {
    let root = document.root_element();
    let (expression, selector_type) = match selector.trim().strip_prefix(XPATH_PREFIX) {
        Some(rest) => (rest.trim(), SelectorType::Xpath),
        None => (selector, SelectorType::Css),
    };

    if selector_type == SelectorType::Css {
        // document-level CSS also matches <html> itself
        let parsed = parse_css(expression)?;
        return Ok(document.select(&parsed).collect());
    }

    Ok(resolve(root, expression, selector_type)?
        .into_iter()
        .filter_map(|m| match m {
            Match::Element(e) => Some(e),
            Match::Value(_) => None,
        })
        .collect())
}

/// First `href` of the first element matching a CSS selector
pub fn first_href(document: &Html, selector: &str) -> Result<Option<String>, SelectorError> {
    let parsed = parse_css(selector)?;
    Ok(document
        .select(&parsed)
        .find_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string))
}
