//! Text helpers shared by the field extractors.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Elements whose text a browser never renders.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new line in rendered text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Approximate `innerText` for an element: hidden subtrees are skipped and
/// block-level elements break lines.
pub fn rendered_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_rendered(element, &mut out);

    out.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_rendered(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if HIDDEN_TAGS.contains(&name) {
        return;
    }
    let is_block = BLOCK_TAGS.contains(&name);
    if is_block {
        out.push('\n');
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_rendered(child_el, out);
                }
            }
            _ => {}
        }
    }

    if is_block {
        out.push('\n');
    }
}

/// Rendered text of the whole `<body>`, or of the document root when absent.
pub fn body_text(document: &Html) -> String {
    match select_all(document, "body").into_iter().next() {
        Some(body) => rendered_text(body),
        None => rendered_text(document.root_element()),
    }
}

/// Every element matching `css`, in document order. Invalid selectors match nothing.
pub fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => document.select(&sel).collect(),
        Err(e) => {
            tracing::warn!("Invalid selector {:?}: {:?}", css, e);
            Vec::new()
        }
    }
}

/// Whitespace-collapsed text of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Whitespace-collapsed text of the first `limit` elements matching `css`.
pub fn texts_of(document: &Html, css: &str, limit: usize) -> Vec<String> {
    select_all(document, css)
        .into_iter()
        .take(limit)
        .map(element_text)
        .collect()
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
