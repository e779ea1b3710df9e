use std::fmt;

/// Pipeline stage an [`ArticleError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Setting up the runtime for the blocking entry point.
    Starting,
    Validating,
    Fetching,
    Extracting,
    Converting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Starting => write!(f, "starting"),
            Stage::Validating => write!(f, "validating"),
            Stage::Fetching => write!(f, "fetching"),
            Stage::Extracting => write!(f, "extracting"),
            Stage::Converting => write!(f, "converting"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("malformed url: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("url has no host")]
    MissingHost,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("no article content found")]
    NoContent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid base url {0:?}")]
    InvalidBaseUrl(String),
    #[error("fragment nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
    #[error("markdown rendering failed: {0}")]
    Render(String),
}

/// Failure of [`crate::extract_url_content`], tagged with the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum ArticleError {
    #[error("starting runtime failed: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("invalid article url: {0}")]
    Url(#[from] UrlError),
    #[error("fetching page failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("extracting article failed: {0}")]
    Extraction(#[from] ExtractError),
    #[error("converting article to markdown failed: {0}")]
    Conversion(#[from] ConvertError),
}

impl ArticleError {
    pub fn stage(&self) -> Stage {
        match self {
            ArticleError::Runtime(_) => Stage::Starting,
            ArticleError::Url(_) => Stage::Validating,
            ArticleError::Fetch(_) => Stage::Fetching,
            ArticleError::Extraction(_) => Stage::Extracting,
            ArticleError::Conversion(_) => Stage::Converting,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ArticleError::Fetch(err) if err.is_timeout())
    }
}
