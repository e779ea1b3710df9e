use url::Url;

use crate::types::UrlError;

/// Parse a caller supplied article URL. Only absolute http(s) URLs with a host are accepted.
pub fn parse_article_url(input: &str) -> Result<Url, UrlError> {
    let url = Url::parse(input.trim())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }
    Ok(url)
}

/// Base used for resolving links in the converted Markdown: `scheme://host[:port]`.
///
/// The port only appears when it differs from the scheme default, so
/// `https://example.com/articles/x?y=1#z` yields `https://example.com`.
pub fn base_url(url: &Url) -> String {
    url.origin().ascii_serialization()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_drops_path_query_and_fragment() {
        let url = parse_article_url("https://example.com/articles/x?y=1#z").unwrap();
        assert_eq!(base_url(&url), "https://example.com");
    }

    #[test]
    fn base_keeps_non_default_port_and_drops_credentials() {
        let url = parse_article_url("http://user:pw@127.0.0.1:8080/a/b").unwrap();
        assert_eq!(base_url(&url), "http://127.0.0.1:8080");

        let url = parse_article_url("https://example.com:443/a").unwrap();
        assert_eq!(base_url(&url), "https://example.com");
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert_eq!(
            parse_article_url("ftp://example.com/file"),
            Err(UrlError::UnsupportedScheme("ftp".into()))
        );
        assert!(matches!(
            parse_article_url("mailto:someone@example.com"),
            Err(UrlError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn rejects_relative_and_garbage_input() {
        assert!(matches!(
            parse_article_url("/articles/x"),
            Err(UrlError::Parse(_))
        ));
        assert!(matches!(parse_article_url(""), Err(UrlError::Parse(_))));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let url = parse_article_url("  https://example.com/a  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a");
    }
}
