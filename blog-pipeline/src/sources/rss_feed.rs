use crate::fetcher::Fetcher;
use crate::parser::FeedParser;
use crate::traits::FeedSource;
use crate::types::{Article, FetchConfig, PipelineError, Result};
use crate::utils::url::is_valid_feed_url;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// RSS/Atom feed source over HTTP
pub struct RssFeedSource {
    fetcher: Arc<Fetcher>,
}

impl RssFeedSource {
    pub fn new(fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Arc::new(Fetcher::new(fetch_config)?),
        })
    }

    pub fn with_fetcher(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch and parse a single feed URL.
    pub async fn fetch_one(&self, url: &str) -> Result<Vec<Article>> {
        if !is_valid_feed_url(url) {
            return Err(PipelineError::feed_unavailable(url, "not an http(s) URL"));
        }

        let content = self.fetcher.fetch_feed(url).await?;
        let fetched_at = Utc::now();
        let parsed = FeedParser::parse_feed(url, &content, fetched_at)?;

        let feed_name = parsed.title.as_deref().unwrap_or(url);
        if parsed.articles.is_empty() {
            warn!("Feed {} has no entries", feed_name);
        } else {
            debug!("Feed {} has {} entries", feed_name, parsed.articles.len());
        }

        Ok(parsed.articles)
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    fn source_name(&self) -> String {
        "RSS Feed".to_string()
    }

    async fn fetch(&self, urls: &[String]) -> Result<Vec<Article>> {
        let mut articles = Vec::new();

        // URL order, then item order within each feed
        for url in urls {
            info!("Pulling RSS feed: {}", url);
            let mut batch = self.fetch_one(url).await?;
            info!("Pulled {} articles from {}", batch.len(), url);
            articles.append(&mut batch);
        }

        Ok(articles)
    }
}
