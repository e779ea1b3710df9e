//! Content-density scoring used to pick the node holding the article body.

use std::collections::HashMap;
use std::sync::LazyLock;

use ego_tree::NodeId;
use regex::Regex;
use scraper::{ElementRef, Html};

use super::text::{inner_text, link_density};

/// Paragraphs shorter than this do not contribute to any score.
const MIN_PARAGRAPH_CHARS: usize = 25;
/// Number of ancestors a paragraph's score propagates to.
const ANCESTOR_LEVELS: usize = 5;

static POSITIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)article|body|content|entry|hentry|h-entry|main|page|pagination|post|text|blog|story")
        .expect("POSITIVE_RE should compile")
});
static NEGATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)-ad-|hidden|^hid$| hid$| hid |^hid |banner|combx|comment|com-|contact|foot|footer|footnote|gdpr|masthead|media|meta|outbrain|promo|related|scroll|share|shoutbox|sidebar|skyscraper|sponsor|shopping|tags|tool|widget")
        .expect("NEGATIVE_RE should compile")
});
static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.( |$)").expect("SENTENCE_END_RE should compile"));

/// Children that stop a `<div>` from being scored like a paragraph.
const DIV_BLOCK_CHILDREN: &[&str] = &[
    "blockquote", "dl", "div", "img", "ol", "p", "pre", "table", "ul", "section", "figure",
];

pub(crate) type NodeScores = HashMap<NodeId, f64>;

/// Class/id weight: +25 per positive hint, -25 per negative hint.
pub(crate) fn class_weight(element: &ElementRef) -> f64 {
    let mut weight = 0.0;
    for attr in ["class", "id"] {
        if let Some(value) = element.value().attr(attr).filter(|v| !v.is_empty()) {
            if NEGATIVE_RE.is_match(value) {
                weight -= 25.0;
            }
            if POSITIVE_RE.is_match(value) {
                weight += 25.0;
            }
        }
    }
    weight
}

fn tag_score(tag: &str) -> f64 {
    match tag {
        "div" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    }
}

/// Only direct children are checked: a `<div>` wrapping a block is a
/// container, whatever sits deeper down.
fn is_paragraph_like(element: &ElementRef) -> bool {
    match element.value().name() {
        "p" | "pre" | "td" => true,
        "div" => !element
            .children()
            .filter_map(ElementRef::wrap)
            .any(|el| DIV_BLOCK_CHILDREN.contains(&el.value().name())),
        _ => false,
    }
}

fn paragraph_score(text: &str) -> f64 {
    let chars = text.chars().count();
    let commas = text.chars().filter(|c| matches!(c, ',' | '\u{ff0c}')).count();
    1.0 + commas as f64 + (chars / 100).min(3) as f64
}

/// Score every ancestor of every paragraph-like element.
pub(crate) fn score_document(doc: &Html) -> NodeScores {
    let mut scores = NodeScores::new();
    let paragraphs: Vec<ElementRef> = doc
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(is_paragraph_like)
        .collect();

    for paragraph in paragraphs {
        let text = inner_text(&paragraph);
        if text.chars().count() < MIN_PARAGRAPH_CHARS {
            continue;
        }
        let score = paragraph_score(&text);

        let ancestors = paragraph
            .ancestors()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() != "html")
            .take(ANCESTOR_LEVELS);
        for (level, ancestor) in ancestors.enumerate() {
            let divider = match level {
                0 => 1.0,
                1 => 2.0,
                n => n as f64 * 3.0,
            };
            let entry = scores.entry(ancestor.id()).or_insert_with(|| {
                tag_score(ancestor.value().name()) + class_weight(&ancestor)
            });
            *entry += score / divider;
        }
    }
    scores
}

/// Scale raw scores by `1 - link density`. Link density is measured once
/// per scored node here and nowhere else.
pub(crate) fn scale_by_link_density(doc: &Html, raw: &NodeScores) -> NodeScores {
    raw.iter()
        .filter_map(|(&id, &score)| {
            let element = doc.tree.get(id).and_then(ElementRef::wrap)?;
            Some((id, score * (1.0 - link_density(&element))))
        })
        .collect()
}

/// Highest scaled score.
pub(crate) fn top_candidate(doc: &Html, scores: &NodeScores) -> Option<(NodeId, f64)> {
    let mut best: Option<(NodeId, f64)> = None;
    // Iterate in document order so ties resolve deterministically.
    for node in doc.tree.root().descendants() {
        let Some(&score) = scores.get(&node.id()) else {
            continue;
        };
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((node.id(), score));
        }
    }
    best
}

/// Top candidate plus the siblings that look like part of the same article.
/// `scores` are the scaled scores.
pub(crate) fn gather_siblings(
    doc: &Html,
    top: NodeId,
    top_score: f64,
    scores: &NodeScores,
) -> Vec<NodeId> {
    let Some(top_el) = doc.tree.get(top).and_then(ElementRef::wrap) else {
        return vec![top];
    };
    let Some(parent) = top_el.parent().and_then(ElementRef::wrap) else {
        return vec![top];
    };
    if matches!(parent.value().name(), "html") {
        return vec![top];
    }

    let threshold = (top_score * 0.2).max(10.0);
    let top_class = top_el.value().attr("class").unwrap_or("");

    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| {
            if sibling.id() == top {
                return true;
            }
            let mut bonus = 0.0;
            if !top_class.is_empty() && sibling.value().attr("class") == Some(top_class) {
                bonus += top_score * 0.2;
            }
            if let Some(&score) = scores.get(&sibling.id()) {
                if score + bonus >= threshold {
                    return true;
                }
            }
            if sibling.value().name() != "p" {
                return false;
            }
            let text = inner_text(sibling);
            let len = text.chars().count();
            let density = link_density(sibling);
            (len > 80 && density < 0.25)
                || (len > 0 && len <= 80 && density == 0.0 && SENTENCE_END_RE.is_match(&text))
        })
        .map(|sibling| sibling.id())
        .collect()
}
