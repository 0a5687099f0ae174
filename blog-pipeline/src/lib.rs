pub mod types;
pub mod utils;
pub mod fetcher;
pub mod parser;
pub mod extract;
pub mod traits;
pub mod sources;
pub mod llm_adapter;
pub mod summarizer;
pub mod markdown;
pub mod publisher;
pub mod pipeline;

pub use types::*;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use extract::ArticleExtractor;
pub use traits::{FeedSource, LlmAdapter, Publisher, Summarize};
pub use sources::RssFeedSource;
pub use llm_adapter::{MockLlmAdapter, OpenAiAdapter};
pub use summarizer::Summarizer;
pub use markdown::DocumentRenderer;
pub use publisher::{GitPublisher, LocalPublisher};
pub use pipeline::{Orchestrator, OrchestratorConfig, RunReport, RunState};
