use crate::types::{Article, PublishOutcome, PublishRequest, Result, Summary};
use async_trait::async_trait;

pub use crate::llm_adapter::LlmAdapter;

/// Source of articles (RSS feeds, fixtures, etc.)
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Fetch every URL in order and concatenate their articles.
    ///
    /// A valid feed with no entries contributes nothing; it is not an error.
    async fn fetch(&self, urls: &[String]) -> Result<Vec<Article>>;
}

/// Turns article text into a [`Summary`].
#[async_trait]
pub trait Summarize: Send + Sync {
    /// Fails only with `EmptyInput`; any other problem degrades to a
    /// fallback summary.
    async fn summarize(&self, text: &str) -> Result<Summary>;
}

/// Writes a document somewhere durable.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn publisher_name(&self) -> String;

    /// All-or-nothing: on error nothing is visible at the destination.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome>;
}
