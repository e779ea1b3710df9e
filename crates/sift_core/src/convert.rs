//! HTML fragment to Markdown.
//!
//! Rendering is delegated to `htmd`. The fragment is parsed once with
//! `scraper` first, to refuse pathological nesting and to keep text that
//! spells out an entity literal. Links and images get their own handlers so
//! they resolve against the page base. Output depends only on the input
//! fragment and base URL.

use std::sync::LazyLock;

use ego_tree::iter::Edge;
use ego_tree::NodeId;
use htmd::element_handler::{ElementHandler, HandlerResult, Handlers};
use htmd::options::{BulletListMarker, Options};
use htmd::{Element, HtmlToMarkdown};
use regex::Regex;
use scraper::node::Node;
use scraper::{Html, StrTendril};
use url::Url;

use crate::extract::normalize_spaces;
use crate::links::{format_destination, parse_base, resolve_reference};
use crate::ConvertError;

/// Nesting beyond this is refused before rendering.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Elements whose content never reaches the Markdown.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "object", "embed", "svg", "canvas",
    "form", "button", "input", "select", "textarea",
];

/// Text that a Markdown renderer would decode as a character reference.
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);")
        .expect("entity pattern should compile")
});

pub trait Converter: Send + Sync {
    /// Render `html` as Markdown, resolving relative links and images against
    /// `base_url`. An empty `base_url` leaves references as written.
    fn to_markdown(&self, html: &str, base_url: &str) -> Result<String, ConvertError>;
}

#[derive(Debug, Clone, Copy)]
pub struct MarkdownConverter {
    max_depth: usize,
}

impl MarkdownConverter {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for MarkdownConverter {
    fn to_markdown(&self, html: &str, base_url: &str) -> Result<String, ConvertError> {
        let base = parse_base(base_url)?;
        let mut fragment = Html::parse_fragment(html);
        check_depth(&fragment, self.max_depth)?;
        keep_entity_text_literal(&mut fragment);
        let prepared = fragment.root_element().inner_html();

        let converter = HtmlToMarkdown::builder()
            .options(markdown_options())
            .skip_tags(SKIPPED_TAGS.to_vec())
            .add_handler(vec!["a"], LinkHandler { base: base.clone() })
            .add_handler(vec!["img"], ImageHandler { base })
            .add_handler(vec!["del", "s", "strike"], StrikeHandler)
            .build();
        let markdown = converter
            .convert(&prepared)
            .map_err(|err| ConvertError::Render(err.to_string()))?;
        Ok(markdown.trim().to_string())
    }
}

fn markdown_options() -> Options {
    Options {
        bullet_list_marker: BulletListMarker::Dash,
        ul_bullet_spacing: 1,
        ol_number_spacing: 1,
        ..Options::default()
    }
}

/// Element nesting is measured without recursion, so a hostile fragment
/// cannot exhaust the stack here or in the renderer.
fn check_depth(fragment: &Html, limit: usize) -> Result<(), ConvertError> {
    let mut depth = 0usize;
    for edge in fragment.tree.root().traverse() {
        match edge {
            Edge::Open(node) if node.value().is_element() => {
                depth += 1;
                if depth > limit {
                    return Err(ConvertError::TooDeep { limit });
                }
            }
            Edge::Close(node) if node.value().is_element() => depth -= 1,
            _ => {}
        }
    }
    Ok(())
}

/// Text such as `&amp;copy;` decodes to `&copy;`, which Markdown would turn
/// back into a symbol. Re-escaping the ampersand keeps it literal. Code is
/// left alone since code spans never decode references.
fn keep_entity_text_literal(fragment: &mut Html) {
    let ids: Vec<NodeId> = fragment
        .tree
        .nodes()
        .filter(|node| match node.value() {
            Node::Text(text) => ENTITY_RE.is_match(text),
            _ => false,
        })
        .filter(|node| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| matches!(el.name(), "pre" | "code"))
            })
        })
        .map(|node| node.id())
        .collect();

    for id in ids {
        if let Some(mut node) = fragment.tree.get_mut(id) {
            if let Node::Text(text) = node.value() {
                let guarded = ENTITY_RE.replace_all(&text.text, "&amp;$1;").into_owned();
                text.text = StrTendril::from_slice(&guarded);
            }
        }
    }
}

fn attr(element: &Element, name: &str) -> Option<String> {
    element
        .attrs
        .iter()
        .find(|attr| &*attr.name.local == name)
        .map(|attr| attr.value.to_string())
        .filter(|value| !value.trim().is_empty())
}

struct LinkHandler {
    base: Option<Url>,
}

impl ElementHandler for LinkHandler {
    fn handle(&self, handlers: &dyn Handlers, element: Element) -> Option<HandlerResult> {
        let content = handlers.walk_children(element.node).content;
        let target = attr(&element, "href")
            .and_then(|href| resolve_reference(&href, self.base.as_ref()));
        let Some(target) = target else {
            return Some(content.into());
        };
        let text = content.trim();
        if text.is_empty() {
            return Some(String::new().into());
        }
        let title = attr(&element, "title").map(|t| normalize_spaces(&t));
        let trailing = if content.ends_with(char::is_whitespace) { " " } else { "" };
        Some(
            format!(
                "[{text}]({}){trailing}",
                format_destination(&target, title.as_deref())
            )
            .into(),
        )
    }
}

struct ImageHandler {
    base: Option<Url>,
}

impl ImageHandler {
    /// Lazy-loading pages park the real source in `data-src` or `srcset`.
    fn source(element: &Element) -> Option<String> {
        attr(element, "src")
            .filter(|src| !src.trim_start().starts_with("data:"))
            .or_else(|| attr(element, "data-src"))
            .or_else(|| {
                attr(element, "srcset").and_then(|set| {
                    set.split(',')
                        .next()
                        .and_then(|entry| entry.split_whitespace().next())
                        .map(str::to_string)
                })
            })
    }
}

impl ElementHandler for ImageHandler {
    fn handle(&self, _handlers: &dyn Handlers, element: Element) -> Option<HandlerResult> {
        let Some(target) =
            Self::source(&element).and_then(|src| resolve_reference(&src, self.base.as_ref()))
        else {
            return Some(String::new().into());
        };
        let alt = attr(&element, "alt")
            .map(|alt| normalize_spaces(&alt).replace('[', "\\[").replace(']', "\\]"))
            .unwrap_or_default();
        let title = attr(&element, "title").map(|t| normalize_spaces(&t));
        Some(format!("![{alt}]({})", format_destination(&target, title.as_deref())).into())
    }
}

struct StrikeHandler;

impl ElementHandler for StrikeHandler {
    fn handle(&self, handlers: &dyn Handlers, element: Element) -> Option<HandlerResult> {
        let content = handlers.walk_children(element.node).content;
        let text = content.trim();
        if text.is_empty() {
            return Some(content.into());
        }
        Some(format!("~~{text}~~").into())
    }
}
