//! Page metadata: meta tags, JSON-LD, `<title>`, icons and language.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use super::dates::parse_timestamp;
use super::text::{inner_text, normalize_spaces};

/// schema.org types treated as articles when reading JSON-LD.
const JSONLD_ARTICLE_TYPES: &[&str] = &[
    "Article",
    "AdvertiserContentArticle",
    "NewsArticle",
    "AnalysisNewsArticle",
    "AskPublicNewsArticle",
    "BackgroundNewsArticle",
    "OpinionNewsArticle",
    "ReportageNewsArticle",
    "ReviewNewsArticle",
    "Report",
    "SatiricalArticle",
    "ScholarlyArticle",
    "MedicalScholarlyArticle",
    "SocialMediaPosting",
    "BlogPosting",
    "LiveBlogPosting",
    "DiscussionForumPosting",
    "TechArticle",
    "APIReference",
];

static TITLE_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" [|\-–—\\/>»] ").expect("TITLE_SEPARATOR_RE should compile"));
static HIERARCHY_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" [\\/>»] ").expect("HIERARCHY_SEPARATOR_RE should compile"));
static ICON_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)x(\d+)$").expect("ICON_SIZE_RE should compile"));

static META_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[content]").expect("META_SEL should parse"));
static JSONLD_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("JSONLD_SEL should parse")
});
static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("TITLE_SEL should parse"));
static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2").expect("HEADING_SEL should parse"));
static ICON_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel][href]").expect("ICON_SEL should parse"));
static AUTHOR_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[itemprop~="author"], [rel="author"], .byline, .author"#)
        .expect("AUTHOR_SEL should parse")
});
static ITEMPROP_DATE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[itemprop="datePublished"], [itemprop="dateModified"]"#)
        .expect("ITEMPROP_DATE_SEL should parse")
});

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct PageMetadata {
    pub title: String,
    pub byline: String,
    pub excerpt: String,
    pub site_name: String,
    pub image: String,
    pub favicon: String,
    pub language: String,
    pub published_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct JsonLd {
    title: Option<String>,
    byline: Option<String>,
    excerpt: Option<String>,
    site_name: Option<String>,
    image: Option<String>,
    published: Option<String>,
    modified: Option<String>,
}

/// Read metadata from an unmodified document.
pub(crate) fn read_metadata(doc: &Html, page_url: &Url) -> PageMetadata {
    let meta = collect_meta_tags(doc);
    let json_ld = read_json_ld(doc);

    let title = json_ld
        .title
        .clone()
        .or_else(|| first_meta(&meta, &["dc:title", "dcterm:title", "og:title", "weibo:article:title", "weibo:webpage:title", "title", "twitter:title"]))
        .unwrap_or_else(|| document_title(doc));

    let byline = json_ld
        .byline
        .clone()
        .or_else(|| first_meta(&meta, &["dc:creator", "dcterm:creator", "author", "parsely-author"]))
        .or_else(|| first_meta(&meta, &["article:author"]).filter(|a| Url::parse(a).is_err()))
        .or_else(|| byline_from_markup(doc))
        .unwrap_or_default();

    let excerpt = json_ld
        .excerpt
        .clone()
        .or_else(|| first_meta(&meta, &["dc:description", "dcterm:description", "og:description", "weibo:article:description", "weibo:webpage:description", "description", "twitter:description"]))
        .unwrap_or_default();

    let site_name = json_ld
        .site_name
        .clone()
        .or_else(|| first_meta(&meta, &["og:site_name"]))
        .unwrap_or_default();

    let image = json_ld
        .image
        .clone()
        .or_else(|| first_meta(&meta, &["og:image", "og:image:url", "og:image:secure_url", "twitter:image", "twitter:image:src"]))
        .and_then(|raw| absolutize(&raw, page_url))
        .unwrap_or_default();

    let published_time = json_ld
        .published
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| {
            first_meta(&meta, &["article:published_time", "dcterms.created", "dc.date", "date", "parsely-pub-date"])
                .as_deref()
                .and_then(parse_timestamp)
        })
        .or_else(|| itemprop_date(doc, "datePublished"));

    let modified_time = json_ld
        .modified
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| {
            first_meta(&meta, &["article:modified_time", "og:updated_time", "dcterms.modified"])
                .as_deref()
                .and_then(parse_timestamp)
        })
        .or_else(|| itemprop_date(doc, "dateModified"));

    PageMetadata {
        title: normalize_spaces(&title),
        byline: normalize_spaces(&byline),
        excerpt: normalize_spaces(&excerpt),
        site_name: normalize_spaces(&site_name),
        image,
        favicon: favicon(doc, page_url).unwrap_or_default(),
        language: language(doc, &meta).unwrap_or_default(),
        published_time,
        modified_time,
    }
}

/// Meta values keyed by lowercased `property`/`name`/`http-equiv`; first occurrence wins.
fn collect_meta_tags(doc: &Html) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for element in doc.select(&META_SEL) {
        let el = element.value();
        let Some(content) = el.attr("content").map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };
        let keys = [el.attr("property"), el.attr("name"), el.attr("http-equiv")];
        for key in keys.into_iter().flatten() {
            // `property` may hold several space separated names.
            for name in key.split_whitespace() {
                values
                    .entry(name.to_ascii_lowercase())
                    .or_insert_with(|| content.to_string());
            }
        }
    }
    values
}

fn first_meta(meta: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| meta.get(*key).cloned())
}

fn read_json_ld(doc: &Html) -> JsonLd {
    for script in doc.select(&JSONLD_SEL) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };
        if let Some(article) = find_article_node(&value) {
            return JsonLd {
                title: string_field(article, "headline").or_else(|| string_field(article, "name")),
                byline: person_names(article.get("author")),
                excerpt: string_field(article, "description"),
                site_name: article
                    .get("publisher")
                    .and_then(|p| string_field(p, "name")),
                image: image_url(article.get("image")),
                published: string_field(article, "datePublished"),
                modified: string_field(article, "dateModified"),
            };
        }
    }
    JsonLd::default()
}

fn find_article_node(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_article_node),
        Value::Object(map) => {
            if is_article_type(map.get("@type")) {
                return Some(value);
            }
            map.get("@graph").and_then(find_article_node)
        }
        _ => None,
    }
}

fn is_article_type(ty: Option<&Value>) -> bool {
    match ty {
        Some(Value::String(s)) => JSONLD_ARTICLE_TYPES.contains(&s.as_str()),
        Some(Value::Array(items)) => items.iter().any(|t| is_article_type(Some(t))),
        _ => false,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn person_names(value: Option<&Value>) -> Option<String> {
    let names: Vec<String> = match value? {
        Value::String(name) => vec![name.trim().to_string()],
        Value::Object(_) => string_field(value?, "name").into_iter().collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name.trim().to_string()),
                other => string_field(other, "name"),
            })
            .collect(),
        _ => Vec::new(),
    };
    let names: Vec<String> = names.into_iter().filter(|n| !n.is_empty()).collect();
    (!names.is_empty()).then(|| names.join(", "))
}

fn image_url(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(url) => Some(url.trim().to_string()).filter(|u| !u.is_empty()),
        Value::Array(items) => items.iter().find_map(|item| image_url(Some(item))),
        other => string_field(other, "url"),
    }
}

fn byline_from_markup(doc: &Html) -> Option<String> {
    doc.select(&AUTHOR_SEL)
        .map(|el| {
            // Microdata authors often nest the name in itemprop="name".
            el.descendants()
                .filter_map(ElementRef::wrap)
                .find(|child| child.value().attr("itemprop") == Some("name"))
                .map(|name| inner_text(&name))
                .unwrap_or_else(|| inner_text(&el))
        })
        .find(|text| !text.is_empty() && text.chars().count() < 100)
}

fn itemprop_date(doc: &Html, prop: &str) -> Option<DateTime<Utc>> {
    doc.select(&ITEMPROP_DATE_SEL)
        .filter(|el| el.value().attr("itemprop") == Some(prop))
        .find_map(|el| {
            el.value()
                .attr("content")
                .or_else(|| el.value().attr("datetime"))
                .and_then(parse_timestamp)
        })
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// `<title>` text with site-name prefixes or suffixes cut when the rest still reads as a title.
fn document_title(doc: &Html) -> String {
    let original = doc
        .select(&TITLE_SEL)
        .next()
        .map(|t| normalize_spaces(&t.text().collect::<String>()))
        .unwrap_or_default();
    if original.is_empty() {
        return original;
    }

    let mut title = original.clone();
    let mut hierarchical = false;

    if let Some(last) = TITLE_SEPARATOR_RE.find_iter(&original).last() {
        hierarchical = HIERARCHY_SEPARATOR_RE.is_match(&original);
        title = original[..last.start()].to_string();
        if word_count(&title) < 3 {
            if let Some(first) = TITLE_SEPARATOR_RE.find(&original) {
                title = original[first.end()..].to_string();
            }
        }
    } else if original.contains(": ") {
        let matches_heading = doc
            .select(&HEADING_SEL)
            .any(|h| inner_text(&h) == original);
        if !matches_heading {
            if let Some(idx) = original.rfind(':') {
                title = original[idx + 1..].to_string();
            }
            if word_count(&title) < 3 {
                if let Some(idx) = original.find(':') {
                    title = original[idx + 1..].to_string();
                }
            } else if original
                .find(':')
                .is_some_and(|idx| word_count(&original[..idx]) > 5)
            {
                title = original.clone();
            }
        }
    } else if original.chars().count() > 150 || original.chars().count() < 15 {
        let mut h1s = doc
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "h1");
        if let (Some(only), None) = (h1s.next(), h1s.next()) {
            title = inner_text(&only);
        }
    }

    let title = normalize_spaces(&title);
    let stripped_words = word_count(&TITLE_SEPARATOR_RE.replace_all(&original, " "));
    if word_count(&title) <= 4
        && (!hierarchical || word_count(&title) + 1 != stripped_words)
    {
        return original;
    }
    title
}

fn language(doc: &Html, meta: &HashMap<String, String>) -> Option<String> {
    doc.root_element()
        .value()
        .attr("lang")
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .or_else(|| meta.get("content-language").cloned())
        .or_else(|| meta.get("og:locale").map(|l| l.replace('_', "-")))
}

/// Largest square icon declared by the page, resolved against its URL.
fn favicon(doc: &Html, page_url: &Url) -> Option<String> {
    let mut best: Option<(u32, &str)> = None;
    for link in doc.select(&ICON_SEL) {
        let el = link.value();
        let is_icon = el
            .attr("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("icon") || r.eq_ignore_ascii_case("apple-touch-icon")));
        if !is_icon {
            continue;
        }
        let Some(href) = el.attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        let size = el
            .attr("sizes")
            .and_then(|sizes| {
                sizes.split_whitespace().find_map(|s| {
                    let caps = ICON_SIZE_RE.captures(s)?;
                    let w: u32 = caps[1].parse().ok()?;
                    let h: u32 = caps[2].parse().ok()?;
                    (w == h).then_some(w)
                })
            })
            .unwrap_or(0);
        if best.map_or(true, |(top, _)| size > top) {
            best = Some((size, href));
        }
    }
    best.and_then(|(_, href)| absolutize(href, page_url))
}

fn absolutize(raw: &str, page_url: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    page_url.join(raw).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url() -> Url {
        Url::parse("https://news.example.com/world/story.html").unwrap()
    }

    #[test]
    fn open_graph_tags_fill_metadata() {
        let doc = Html::parse_document(
            r#"<html lang="en-GB"><head>
                <title>Ignored | News</title>
                <meta property="og:title" content="Rivers rise across the valley">
                <meta property="og:site_name" content="Example News">
                <meta property="og:image" content="/img/hero.jpg">
                <meta name="description" content="Flood warnings were issued.">
                <meta name="author" content="Jane Doe">
                <meta property="article:published_time" content="2024-03-01T10:15:00+01:00">
                <link rel="icon" href="/favicon-16.png" sizes="16x16">
                <link rel="icon" href="/favicon-64.png" sizes="64x64">
            </head><body></body></html>"#,
        );
        let meta = read_metadata(&doc, &url());
        assert_eq!(meta.title, "Rivers rise across the valley");
        assert_eq!(meta.site_name, "Example News");
        assert_eq!(meta.image, "https://news.example.com/img/hero.jpg");
        assert_eq!(meta.excerpt, "Flood warnings were issued.");
        assert_eq!(meta.byline, "Jane Doe");
        assert_eq!(meta.language, "en-GB");
        assert_eq!(meta.favicon, "https://news.example.com/favicon-64.png");
        assert_eq!(meta.published_time.map(|t| t.timestamp()), Some(1_709_284_500));
        assert_eq!(meta.modified_time, None);
    }

    #[test]
    fn json_ld_takes_precedence() {
        let doc = Html::parse_document(
            r#"<html><head>
                <meta property="og:title" content="OG title">
                <script type="application/ld+json">
                {"@context":"https://schema.org","@graph":[
                    {"@type":"WebSite","name":"Site"},
                    {"@type":["NewsArticle"],"headline":"LD headline",
                     "author":[{"@type":"Person","name":"A. Writer"},{"name":"B. Writer"}],
                     "publisher":{"name":"LD Publisher"},
                     "image":{"url":"https://cdn.example.com/a.jpg"},
                     "datePublished":"2024-03-01","dateModified":"2024-03-02T00:00:00Z"}
                ]}
                </script>
            </head><body></body></html>"#,
        );
        let meta = read_metadata(&doc, &url());
        assert_eq!(meta.title, "LD headline");
        assert_eq!(meta.byline, "A. Writer, B. Writer");
        assert_eq!(meta.site_name, "LD Publisher");
        assert_eq!(meta.image, "https://cdn.example.com/a.jpg");
        assert_eq!(meta.published_time.map(|t| t.timestamp()), Some(1_709_251_200));
        assert_eq!(meta.modified_time.map(|t| t.timestamp()), Some(1_709_337_600));
    }

    #[test]
    fn site_suffix_is_cut_from_document_title() {
        let doc = Html::parse_document(
            "<html><head><title>Rivers rise across the whole valley - Example News</title></head></html>",
        );
        assert_eq!(document_title(&doc), "Rivers rise across the whole valley");
    }

    #[test]
    fn short_titles_are_kept_whole() {
        let doc = Html::parse_document(
            "<html><head><title>Example Domain</title></head><body><h1>Example Domain</h1></body></html>",
        );
        assert_eq!(document_title(&doc), "Example Domain");
    }

    #[test]
    fn unattributed_static_page_has_no_byline_or_dates() {
        let doc = Html::parse_document(
            "<html><head><title>Example Domain</title></head><body><p>Hi</p></body></html>",
        );
        let meta = read_metadata(&doc, &url());
        assert_eq!(meta.byline, "");
        assert_eq!(meta.published_time, None);
        assert_eq!(meta.image, "");
        assert_eq!(meta.favicon, "");
    }

    #[test]
    fn author_url_is_not_a_byline() {
        let doc = Html::parse_document(
            r#"<html><head><meta property="article:author" content="https://facebook.com/someone"></head>
            <body><span class="byline">By Sam Reporter</span></body></html>"#,
        );
        assert_eq!(read_metadata(&doc, &url()).byline, "By Sam Reporter");
    }
}
