use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::ElementRef;

/// Elements that break the flow of text into separate lines.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "ol", "p", "pre", "section", "table", "tr", "ul",
];

fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

pub(crate) fn normalize_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-collapsed text of an element.
pub(crate) fn inner_text(element: &ElementRef) -> String {
    normalize_spaces(&element.text().collect::<String>())
}

/// Share of an element's text that sits inside links, weighting in-page
/// anchors lower since they rarely indicate navigation chrome.
pub(crate) fn link_density(element: &ElementRef) -> f64 {
    let total = inner_text(element).chars().count();
    if total == 0 {
        return 0.0;
    }
    let linked: f64 = element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .map(|a| {
            let coefficient = match a.value().attr("href") {
                Some(href) if href.trim_start().starts_with('#') => 0.3,
                _ => 1.0,
            };
            inner_text(&a).chars().count() as f64 * coefficient
        })
        .sum();
    linked / total as f64
}

/// Plain-text rendering: whitespace collapsed within blocks, one block per line.
pub(crate) fn render_text(root: NodeRef<'_, Node>) -> String {
    let mut lines = Vec::new();
    let mut current = String::new();
    collect_text(root, &mut lines, &mut current);
    flush_line(&mut lines, &mut current);
    lines.join("\n")
}

fn collect_text(node: NodeRef<'_, Node>, lines: &mut Vec<String>, current: &mut String) {
    match node.value() {
        Node::Text(text) => current.push_str(text),
        Node::Element(element) => {
            let tag = element.name();
            if tag == "br" {
                flush_line(lines, current);
                return;
            }
            let block = is_block_tag(tag);
            if block {
                flush_line(lines, current);
            }
            for child in node.children() {
                collect_text(child, lines, current);
            }
            if block {
                flush_line(lines, current);
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, lines, current);
            }
        }
    }
}

fn flush_line(lines: &mut Vec<String>, current: &mut String) {
    let line = normalize_spaces(current);
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}
