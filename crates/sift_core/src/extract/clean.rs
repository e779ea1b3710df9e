//! DOM pruning before scoring and cleanup of the chosen content nodes.

use std::sync::LazyLock;

use ego_tree::NodeId;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html};

use super::scoring::class_weight;
use super::text::{inner_text, link_density, normalize_spaces};

/// Removed wherever they appear.
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "object", "embed", "svg", "canvas",
    "nav", "aside", "footer", "button", "input", "select", "textarea", "dialog", "link", "meta",
];

/// Elements that never count as unlikely candidates themselves.
const PROTECTED_TAGS: &[&str] = &["html", "head", "body", "a", "article", "main"];

const CHROME_ROLES: &[&str] = &[
    "menu", "menubar", "complementary", "navigation", "alert", "alertdialog", "dialog",
];

static UNLIKELY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|footer|gdpr|header|legends|menu|related|remark|replies|rss|shoutbox|sidebar|skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|yom-remote")
        .expect("UNLIKELY_RE should compile")
});
static MAYBE_CANDIDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)and|article|body|column|content|main|shadow")
        .expect("MAYBE_CANDIDATE_RE should compile")
});
static HIDDEN_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)display\s*:\s*none|visibility\s*:\s*hidden")
        .expect("HIDDEN_STYLE_RE should compile")
});
static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("WORD_RE should compile"));

/// Tags subject to the link-density/content-shape test inside the article.
const CONDITIONAL_TAGS: &[&str] = &["form", "fieldset", "ul", "ol", "div", "section"];
const EMBED_TAGS: &[&str] = &["img", "picture", "video", "audio", "source"];

fn detach_all(doc: &mut Html, ids: Vec<NodeId>) {
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn is_hidden(element: &ElementRef) -> bool {
    let el = element.value();
    el.attr("hidden").is_some()
        || el.attr("aria-hidden") == Some("true")
        || el.attr("style").is_some_and(|style| HIDDEN_STYLE_RE.is_match(style))
}

fn is_unlikely_candidate(element: &ElementRef) -> bool {
    let el = element.value();
    if PROTECTED_TAGS.contains(&el.name()) {
        return false;
    }
    if el.attr("role").is_some_and(|role| CHROME_ROLES.contains(&role)) {
        return true;
    }
    let hints = format!("{} {}", el.attr("class").unwrap_or(""), el.attr("id").unwrap_or(""));
    if !UNLIKELY_RE.is_match(&hints) || MAYBE_CANDIDATE_RE.is_match(&hints) {
        return false;
    }
    // Tables and code keep their inner structure intact.
    !element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().name(), "table" | "code"))
}

/// Drop comments, scripting, chrome, hidden and unlikely nodes from the whole document.
pub(crate) fn prune_document(doc: &mut Html) {
    let doomed: Vec<NodeId> = doc
        .tree
        .root()
        .descendants()
        .filter(|node| match node.value() {
            Node::Comment(_) => true,
            Node::Element(el) => {
                if STRIPPED_TAGS.contains(&el.name()) {
                    // <meta>/<link> in <head> carry nothing the body needs.
                    return true;
                }
                ElementRef::wrap(*node)
                    .is_some_and(|element| is_hidden(&element) || is_unlikely_candidate(&element))
            }
            _ => false,
        })
        .map(|node| node.id())
        .collect();
    detach_all(doc, doomed);
}

fn words(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Share of `b`'s words (by length) that also occur in `a`.
pub(crate) fn text_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = words(a);
    let tokens_b = words(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let unique_b: Vec<&str> = tokens_b
        .iter()
        .filter(|t| !tokens_a.contains(t))
        .map(String::as_str)
        .collect();
    let distance = unique_b.join(" ").chars().count() as f64
        / tokens_b.join(" ").chars().count() as f64;
    1.0 - distance
}

/// Remove the first `h1`/`h2` repeating the article title.
pub(crate) fn remove_title_heading(doc: &mut Html, title: &str) {
    if title.trim().is_empty() {
        return;
    }
    let duplicate = doc
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "h1" | "h2"))
        .find(|heading| text_similarity(title, &inner_text(heading)) > 0.75)
        .map(|heading| heading.id());
    if let Some(id) = duplicate {
        detach_all(doc, vec![id]);
    }
}

fn count_tags(element: &ElementRef, tags: &[&str]) -> usize {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|el| tags.contains(&el.value().name()))
        .count()
}

fn looks_like_boilerplate(element: &ElementRef) -> bool {
    let weight = class_weight(element);
    if weight < 0.0 {
        return true;
    }
    let text = inner_text(element);
    if text.matches(',').count() >= 10 {
        return false;
    }

    let tag = element.value().name();
    let is_list = matches!(tag, "ul" | "ol");
    let paragraphs = count_tags(element, &["p"]);
    let images = count_tags(element, &["img"]);
    let list_items = count_tags(element, &["li"]).saturating_sub(100);
    let inputs = count_tags(element, &["input"]);
    let content_len = text.chars().count();
    let density = link_density(element);

    (images > 1 && (paragraphs as f64) / (images as f64) < 0.5)
        || (!is_list && list_items > paragraphs)
        || (inputs as f64 > (paragraphs as f64 / 3.0).floor())
        || (!is_list && content_len < 25 && (images == 0 || images > 2))
        || (!is_list && weight < 25.0 && density > 0.2)
        || (weight >= 25.0 && density > 0.5)
}

fn is_empty_paragraph(element: &ElementRef) -> bool {
    element.value().name() == "p"
        && normalize_spaces(&element.text().collect::<String>()).is_empty()
        && count_tags(element, EMBED_TAGS) == 0
}

/// Clean inside the chosen nodes: boilerplate containers, headings with
/// negative hints, and empty paragraphs. The chosen nodes themselves stay.
pub(crate) fn prepare_content(doc: &mut Html, kept: &[NodeId]) {
    let mut doomed = Vec::new();
    for &root in kept {
        let Some(root_el) = doc.tree.get(root).and_then(ElementRef::wrap) else {
            continue;
        };
        for element in root_el.descendants().skip(1).filter_map(ElementRef::wrap) {
            let tag = element.value().name();
            let remove = if CONDITIONAL_TAGS.contains(&tag) {
                looks_like_boilerplate(&element)
            } else if matches!(tag, "h1" | "h2" | "h3") {
                class_weight(&element) < 0.0
            } else {
                is_empty_paragraph(&element)
            };
            if remove {
                doomed.push(element.id());
            }
        }
    }
    detach_all(doc, doomed);
}
