use crate::extract::html_to_text;
use crate::utils::text::normalize_whitespace;
use crate::types::{Article, PipelineError, Result};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use tracing::{debug, info};

/// Parsed channel plus its entries, in document order.
#[derive(Debug)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub articles: Vec<Article>,
}

pub struct FeedParser;

impl FeedParser {
    /// Parse RSS or Atom content. `fetched_at` stands in for missing
    /// publication dates.
    ///
    /// Entries are kept as they appear; nothing is deduplicated.
    pub fn parse_feed(url: &str, content: &str, fetched_at: DateTime<Utc>) -> Result<ParsedFeed> {
        debug!("Parsing feed content from {} ({} bytes)", url, content.len());

        let feed = parser::parse(content.as_bytes()).map_err(|e| PipelineError::FeedMalformed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let title = feed.title.map(|t| t.content);
        let articles: Vec<Article> = feed
            .entries
            .into_iter()
            .map(|entry| Self::parse_entry(entry, fetched_at))
            .collect();

        info!("Parsed feed {} with {} entries", url, articles.len());

        Ok(ParsedFeed { title, articles })
    }

    fn parse_entry(entry: feed_rs::model::Entry, fetched_at: DateTime<Utc>) -> Article {
        let title = entry
            .title
            .map(|t| field_text(&t.content, t.content_type.essence_str()))
            .unwrap_or_default();

        let link = entry
            .links
            .first()
            .map(|link| link.href.clone())
            .unwrap_or_default();

        let description = entry
            .summary
            .map(|s| field_text(&s.content, s.content_type.essence_str()))
            .unwrap_or_default();

        // Prefer the full content body, fall back to the description
        let content = entry
            .content
            .and_then(|c| {
                let essence = c.content_type.essence_str().to_string();
                c.body.map(|body| field_text(&body, &essence))
            })
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| description.clone());

        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(fetched_at);

        Article {
            title,
            link,
            description,
            content,
            published_at,
        }
    }
}

/// Markup is stripped only from fields the feed declares as HTML; plain
/// text keeps every character.
fn field_text(value: &str, content_type: &str) -> String {
    if content_type == "text/html" || content_type.ends_with("xhtml+xml") {
        html_to_text(value)
    } else {
        normalize_whitespace(value)
    }
}
