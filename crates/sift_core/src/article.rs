//! URL in, [`Article`] out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sift_logging::{sift_debug, sift_info, sift_warn};
use url::Url;

use crate::convert::{Converter, MarkdownConverter};
use crate::decode::decode_html;
use crate::extract::{ExtractedArticle, Extractor, ReadabilityExtractor};
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::source_url::{base_url, parse_article_url};
use crate::ArticleError;

/// Result of one extraction call. `Default` is the zero value: empty strings
/// and zero numbers. Timestamps are Unix seconds, `0` when the page does not
/// state them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub author: String,
    pub html_content: String,
    pub text_content: String,
    pub markdown_content: String,
    pub length: usize,
    pub excerpt: String,
    pub site_name: String,
    pub image: String,
    pub favicon: String,
    pub language: String,
    pub published_at: i64,
    pub modified_at: i64,
}

impl Article {
    fn assemble(extracted: ExtractedArticle, markdown_content: String) -> Self {
        Self {
            title: extracted.title,
            author: extracted.byline,
            html_content: extracted.content,
            text_content: extracted.text_content,
            markdown_content,
            length: extracted.length,
            excerpt: extracted.excerpt,
            site_name: extracted.site_name,
            image: extracted.image,
            favicon: extracted.favicon,
            language: extracted.language,
            published_at: epoch_seconds(extracted.published_time),
            modified_at: epoch_seconds(extracted.modified_time),
        }
    }
}

fn epoch_seconds(time: Option<DateTime<Utc>>) -> i64 {
    time.map_or(0, |t| t.timestamp().max(0))
}

/// Fetch, extract and convert pipeline. Holds no per-call state, so one
/// instance can serve concurrent calls.
pub struct ArticleExtractor {
    fetcher: Box<dyn Fetcher>,
    extractor: Box<dyn Extractor>,
    converter: Box<dyn Converter>,
}

impl ArticleExtractor {
    pub fn new(settings: FetchSettings) -> Self {
        Self::with_parts(
            Box::new(ReqwestFetcher::new(settings)),
            Box::new(ReadabilityExtractor),
            Box::new(MarkdownConverter::new()),
        )
    }

    pub fn with_parts(
        fetcher: Box<dyn Fetcher>,
        extractor: Box<dyn Extractor>,
        converter: Box<dyn Converter>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            converter,
        }
    }

    pub async fn extract(&self, url: &str) -> Result<Article, ArticleError> {
        let result = self.run(url).await;
        match &result {
            Ok(article) => sift_info!(
                "extracted {url:?}: {:?}, {} chars",
                article.title,
                article.length
            ),
            Err(err) => sift_warn!("extraction of {url:?} failed while {}: {err}", err.stage()),
        }
        result
    }

    async fn run(&self, url: &str) -> Result<Article, ArticleError> {
        let page_url = parse_article_url(url)?;
        let base = base_url(&page_url);
        sift_debug!("validated {page_url}, links resolve against {base}");

        let fetched = self.fetcher.fetch(&page_url).await?;

        let decoded = decode_html(&fetched.bytes, fetched.metadata.content_type.as_deref());
        sift_debug!(
            "decoded {} bytes as {}{}",
            fetched.metadata.byte_len,
            decoded.encoding_label,
            if decoded.had_replacements { " with replacements" } else { "" }
        );

        // Metadata URLs resolve against where the page actually came from.
        let final_url = Url::parse(&fetched.metadata.final_url).unwrap_or(page_url);
        let extracted = self.extractor.extract(&decoded.html, &final_url)?;
        sift_debug!(
            "extracted {:?} ({} chars of text)",
            extracted.title,
            extracted.length
        );

        let markdown = self.converter.to_markdown(&extracted.content, &base)?;
        sift_debug!("converted to {} bytes of markdown", markdown.len());

        Ok(Article::assemble(extracted, markdown))
    }
}

impl Default for ArticleExtractor {
    fn default() -> Self {
        Self::new(FetchSettings::default())
    }
}

/// Extract the main article of `url` with default settings.
pub async fn extract_url_content(url: &str) -> Result<Article, ArticleError> {
    ArticleExtractor::default().extract(url).await
}

/// Blocking form of [`extract_url_content`] for callers without a runtime.
/// Must not be called from inside an async context.
pub fn extract_url_content_blocking(url: &str) -> Result<Article, ArticleError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ArticleError::Runtime)?;
    runtime.block_on(extract_url_content(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_map_to_epoch_seconds() {
        assert_eq!(epoch_seconds(None), 0);
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap();
        assert_eq!(epoch_seconds(Some(t)), 1_709_284_500);
        let before_epoch = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(epoch_seconds(Some(before_epoch)), 0);
    }

    #[test]
    fn zero_value_article_is_empty() {
        let article = Article::default();
        assert!(article.title.is_empty());
        assert!(article.markdown_content.is_empty());
        assert_eq!(article.length, 0);
        assert_eq!(article.published_at, 0);
    }

    #[test]
    fn article_serializes_with_snake_case_fields() {
        let article = Article {
            title: "T".into(),
            published_at: 42,
            ..Article::default()
        };
        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["title"], "T");
        assert_eq!(json["published_at"], 42);
        assert_eq!(json["markdown_content"], "");
        let back: Article = serde_json::from_value(json).unwrap();
        assert_eq!(back, article);
    }
}
