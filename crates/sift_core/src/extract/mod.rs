//! Readability-style article extraction.
//!
//! The document is parsed once with `scraper`. Metadata is read before any
//! pruning; the DOM is then stripped of chrome, scored for content density,
//! and the winning subtree (plus related siblings) is serialized as the
//! article fragment.

mod clean;
mod dates;
mod metadata;
mod scoring;
mod text;

use chrono::{DateTime, Utc};
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use sift_logging::{sift_debug, sift_trace};
use url::Url;

use crate::ExtractError;

pub(crate) use text::normalize_spaces;

/// Output of an [`Extractor`]. Timestamps stay `None` when the page does not
/// state them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedArticle {
    pub title: String,
    pub byline: String,
    pub content: String,
    pub text_content: String,
    pub length: usize,
    pub excerpt: String,
    pub site_name: String,
    pub image: String,
    pub favicon: String,
    pub language: String,
    pub published_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, page_url: &Url) -> Result<ExtractedArticle, ExtractError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadabilityExtractor;

impl Extractor for ReadabilityExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> Result<ExtractedArticle, ExtractError> {
        let mut doc = Html::parse_document(html);
        let meta = metadata::read_metadata(&doc, page_url);

        clean::prune_document(&mut doc);
        clean::remove_title_heading(&mut doc, &meta.title);

        let scores = scoring::scale_by_link_density(&doc, &scoring::score_document(&doc));
        let kept = match scoring::top_candidate(&doc, &scores) {
            Some((top, score)) => {
                sift_trace!("top candidate scored {score:.1}");
                scoring::gather_siblings(&doc, top, score, &scores)
            }
            None => {
                sift_debug!("no scored candidate in {page_url}, falling back to article/body");
                fallback_container(&doc).into_iter().collect()
            }
        };
        if kept.is_empty() {
            return Err(ExtractError::NoContent);
        }

        clean::prepare_content(&mut doc, &kept);
        let content = serialize_fragment(&doc, &kept);

        let fragment = Html::parse_fragment(&content);
        let text_content = text::render_text(fragment.tree.root());
        if text_content.is_empty() {
            return Err(ExtractError::NoContent);
        }
        let length = text_content.chars().count();

        let excerpt = if meta.excerpt.is_empty() {
            first_paragraph(&fragment).unwrap_or_default()
        } else {
            meta.excerpt
        };

        Ok(ExtractedArticle {
            title: meta.title,
            byline: meta.byline,
            content,
            text_content,
            length,
            excerpt,
            site_name: meta.site_name,
            image: meta.image,
            favicon: meta.favicon,
            language: meta.language,
            published_time: meta.published_time,
            modified_time: meta.modified_time,
        })
    }
}

fn fallback_container(doc: &Html) -> Option<NodeId> {
    ["article", "body"].iter().find_map(|tag| {
        let sel = Selector::parse(tag).ok()?;
        doc.select(&sel).next().map(|el| el.id())
    })
}

fn serialize_fragment(doc: &Html, kept: &[NodeId]) -> String {
    let mut out = String::from(r#"<div id="readability-page-1" class="page">"#);
    for id in kept {
        if let Some(element) = doc.tree.get(*id).and_then(ElementRef::wrap) {
            // A lone <body> fallback is unwrapped; the page div replaces it.
            if element.value().name() == "body" {
                out.push_str(&element.inner_html());
            } else {
                out.push_str(&element.html());
            }
        }
    }
    out.push_str("</div>");
    out
}

fn first_paragraph(fragment: &Html) -> Option<String> {
    let sel = Selector::parse("p").ok()?;
    fragment
        .select(&sel)
        .map(|p| text::inner_text(&p))
        .find(|t| !t.is_empty())
}
