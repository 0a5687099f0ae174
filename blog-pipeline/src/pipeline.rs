use crate::extract::ArticleExtractor;
use crate::markdown::{expand_path, DocumentRenderer};
use crate::traits::{FeedSource, Publisher, Summarize};
use crate::types::{
    Article, PipelineError, PublishOutcome, PublishRequest, PublishTarget, Result, RunFailure, Stage, StageTimeouts,
};
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Summarizing,
    Rendering,
    Publishing,
    Done,
    Failed { stage: Stage, cause: String },
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("Idle"),
            RunState::Fetching => f.write_str("Fetching"),
            RunState::Summarizing => f.write_str("Summarizing"),
            RunState::Rendering => f.write_str("Rendering"),
            RunState::Publishing => f.write_str("Publishing"),
            RunState::Done => f.write_str("Done"),
            RunState::Failed { stage, .. } => write!(f, "Failed({})", stage),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub timeouts: StageTimeouts,
    /// Handed to the publisher with every request.
    pub credential: Option<String>,
}

/// Result of a run that reached `Done`.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub article_title: String,
    pub article_link: String,
    pub document_path: String,
    pub outcome: PublishOutcome,
    pub states: Vec<RunState>,
}

/// Drives one article from feed to published post.
///
/// Stages run strictly one after another and none is retried. The first
/// failure ends the run and is returned tagged with its stage.
pub struct Orchestrator {
    feed_source: Arc<dyn FeedSource>,
    summarizer: Arc<dyn Summarize>,
    publisher: Arc<dyn Publisher>,
    renderer: DocumentRenderer,
    extractor: Option<Arc<ArticleExtractor>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        feed_source: Arc<dyn FeedSource>,
        summarizer: Arc<dyn Summarize>,
        publisher: Arc<dyn Publisher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            feed_source,
            summarizer,
            publisher,
            renderer: DocumentRenderer::new(),
            extractor: None,
            config,
        }
    }

    /// Fetch the article page when the feed item has no body text.
    pub fn with_article_extractor(mut self, extractor: Arc<ArticleExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub async fn run(&self, feed_urls: &[String], target: &PublishTarget) -> std::result::Result<RunReport, RunFailure> {
        let mut tracker = RunTracker::new();
        info!(
            "[{}] Starting run: {} feed(s) -> {} via {}",
            tracker.run_id,
            feed_urls.len(),
            target.path,
            self.publisher.publisher_name()
        );

        match self.drive(&mut tracker, feed_urls, target).await {
            Ok(report) => Ok(report),
            Err(failure) => {
                tracker.advance(RunState::Failed {
                    stage: failure.stage,
                    cause: failure.cause.to_string(),
                });
                error!("[{}] Run stopped in the {} stage", tracker.run_id, failure.stage);
                Err(failure)
            }
        }
    }

    async fn drive(
        &self,
        tracker: &mut RunTracker,
        feed_urls: &[String],
        target: &PublishTarget,
    ) -> std::result::Result<RunReport, RunFailure> {
        let timeouts = self.config.timeouts;

        tracker.advance(RunState::Fetching);
        let articles = within(Stage::Fetching, timeouts.fetch, self.feed_source.fetch(feed_urls)).await?;
        let total = articles.len();
        let article = articles.into_iter().next().ok_or(RunFailure {
            stage: Stage::Fetching,
            cause: PipelineError::NoArticles,
        })?;
        info!("[{}] {} article(s) fetched, using \"{}\"", tracker.run_id, total, article.title);

        tracker.advance(RunState::Summarizing);
        let summary = within(Stage::Summarizing, timeouts.summarize, async {
            let text = self.article_text(&article).await;
            self.summarizer.summarize(&text).await
        })
        .await?;

        tracker.advance(RunState::Rendering);
        let document = self
            .renderer
            .render(&article.title, &summary, Utc::now())
            .map_err(|cause| RunFailure {
                stage: Stage::Rendering,
                cause,
            })?;

        tracker.advance(RunState::Publishing);
        let document_path = expand_path(&target.path, &document);
        let request = PublishRequest {
            content: document.body,
            target: target.clone().with_path(document_path.clone()),
            credential: self.config.credential.clone(),
        };
        let outcome = within(Stage::Publishing, timeouts.publish, self.publisher.publish(&request)).await?;

        tracker.advance(RunState::Done);
        Ok(RunReport {
            run_id: tracker.run_id,
            article_title: article.title,
            article_link: article.link,
            document_path,
            outcome,
            states: std::mem::take(&mut tracker.states),
        })
    }

    async fn article_text(&self, article: &Article) -> String {
        let body = article.body();
        if !body.trim().is_empty() {
            return body.to_string();
        }

        let Some(extractor) = &self.extractor else {
            return String::new();
        };
        if article.link.is_empty() {
            return String::new();
        }

        match extractor.extract(&article.link).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not extract article text from {}: {}", article.link, e);
                String::new()
            }
        }
    }
}

struct RunTracker {
    run_id: Uuid,
    states: Vec<RunState>,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            states: vec![RunState::Idle],
        }
    }

    fn advance(&mut self, next: RunState) {
        let previous = self.states.last().map(ToString::to_string).unwrap_or_default();
        info!("[{}] {} -> {}", self.run_id, previous, next);
        self.states.push(next);
    }
}

/// Run one stage under its deadline, tagging any failure with the stage.
async fn within<T, F>(stage: Stage, limit: Duration, work: F) -> std::result::Result<T, RunFailure>
where
    F: Future<Output = Result<T>>,
{
    match timeout(limit, work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(cause)) => Err(RunFailure { stage, cause }),
        Err(_) => Err(RunFailure {
            stage,
            cause: PipelineError::Timeout {
                stage,
                seconds: limit.as_secs(),
            },
        }),
    }
}
