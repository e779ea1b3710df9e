use url::Url;

use crate::ConvertError;

/// Parse the base used for link resolution. An empty base disables resolution.
pub(crate) fn parse_base(base_url: &str) -> Result<Option<Url>, ConvertError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match Url::parse(trimmed) {
        Ok(url) if !url.cannot_be_a_base() => Ok(Some(url)),
        _ => Err(ConvertError::InvalidBaseUrl(base_url.to_string())),
    }
}

/// Resolve an `href`/`src` value for Markdown output.
///
/// Absolute references are kept verbatim, relative ones are joined onto
/// `base`. In-page anchors and `javascript:` links have no useful target
/// and yield `None`.
pub(crate) fn resolve_reference(reference: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") {
        return None;
    }
    if Url::parse(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }
    match base {
        Some(base) => base.join(trimmed).ok().map(String::from),
        None => Some(trimmed.to_string()),
    }
}

/// Link destination safe to place inside `( )`.
pub(crate) fn format_destination(url: &str, title: Option<&str>) -> String {
    let dest = url
        .replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29");
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!("{dest} \"{}\"", title.replace('"', "\\\"")),
        None => dest,
    }
}
