//! Sift: fetch a web page, isolate its main article and render it as Markdown.
mod article;
mod convert;
mod decode;
mod extract;
mod fetch;
mod links;
mod source_url;
mod types;

pub use article::{extract_url_content, extract_url_content_blocking, Article, ArticleExtractor};
pub use convert::{Converter, MarkdownConverter, DEFAULT_MAX_DEPTH};
pub use decode::{decode_html, DecodedHtml};
pub use extract::{ExtractedArticle, Extractor, ReadabilityExtractor};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT};
pub use source_url::{base_url, parse_article_url};
pub use types::{
    ArticleError, ConvertError, ExtractError, FailureKind, FetchError, FetchMetadata, FetchOutput,
    Stage, UrlError,
};
