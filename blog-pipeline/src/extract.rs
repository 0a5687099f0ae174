//! Plain-text extraction from HTML fragments and article pages.

use crate::fetcher::Fetcher;
use crate::types::Result;
use crate::utils::text::normalize_whitespace;
use scraper::{Html, Node, Selector};
use std::sync::Arc;
use tracing::{debug, info};

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "td", "blockquote",
    "section", "article", "pre", "hr",
];

const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "big", "cite", "code", "em", "font", "i", "img", "kbd", "mark", "q", "s", "small", "span",
    "strike", "strong", "sub", "sup", "time", "u", "wbr", "figure", "figcaption", "table", "tbody", "thead", "th",
    "dl", "dt", "dd", "header", "footer", "aside", "main", "nav", "picture", "source", "video", "audio", "iframe",
    "center", "html", "body",
];

/// Whether the `<` at the start of `rest` opens a real HTML tag or comment.
fn opens_tag(rest: &str) -> bool {
    let after = &rest[1..];
    if after.starts_with('!') {
        return true;
    }
    let name_start = after.strip_prefix('/').unwrap_or(after);
    let name_len = name_start
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(name_start.len());
    if name_len == 0 {
        return false;
    }
    let (name, tail) = name_start.split_at(name_len);
    let known = BLOCK_ELEMENTS
        .iter()
        .chain(INLINE_ELEMENTS)
        .any(|tag| tag.eq_ignore_ascii_case(name));
    known && (tail.starts_with('>') || tail.starts_with('/') || tail.starts_with(char::is_whitespace))
}

/// Escape every `<` that does not open a known tag, so decoded text such as
/// `Vec<T>` or `x<y` survives HTML parsing.
fn escape_stray_angles(html: &str) -> String {
    let mut escaped = String::with_capacity(html.len());
    for (index, c) in html.char_indices() {
        if c == '<' && !opens_tag(&html[index..]) {
            escaped.push_str("&lt;");
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Visible text of an HTML fragment with whitespace normalized.
///
/// Block-level elements act as word separators; inline markup does not.
pub fn html_to_text(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return normalize_whitespace(html);
    }

    let fragment = Html::parse_fragment(&escape_stray_angles(html));
    let mut text = String::with_capacity(html.len());

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(element) if BLOCK_ELEMENTS.contains(&element.name()) => text.push(' '),
            _ => {}
        }
    }

    normalize_whitespace(&text)
}

/// Text of every non-empty `<p>` in a page, one paragraph per block.
pub fn extract_paragraphs(page: &str) -> String {
    let document = Html::parse_document(page);
    let Ok(selector) = Selector::parse("p") else {
        return String::new();
    };

    document
        .select(&selector)
        .map(|p| normalize_whitespace(&p.text().collect::<String>()))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Pulls article text from the article's own page when the feed carries none.
pub struct ArticleExtractor {
    fetcher: Arc<Fetcher>,
}

impl ArticleExtractor {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn extract(&self, url: &str) -> Result<String> {
        let page = self.fetcher.fetch_full_content(url).await?;
        let text = extract_paragraphs(&page);
        info!("Extracted {} characters of article text from {}", text.len(), url);
        if text.is_empty() {
            debug!("No <p> content found at {}", url);
        }
        Ok(text)
    }
}
