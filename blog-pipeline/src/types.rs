use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// Shared data model lives in the interfaces crate
pub use interfaces::defs::{Article, Document, PublishOutcome, PublishRequest, PublishTarget, Summary};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Blogenetes/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 1,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    /// Longest a fetch of `feeds` URLs can take when every attempt runs into
    /// the request timeout and every backoff sleep hits its upper bound.
    pub fn stage_budget(&self, feeds: usize) -> Duration {
        let delay = self.retry_delay_seconds;
        let cap = delay.saturating_mul(32);
        let attempts = u64::from(self.max_retries) + 1;

        let mut per_feed = self.timeout_seconds.saturating_mul(attempts);
        for retry in 0..self.max_retries {
            let interval = delay.saturating_mul(1u64 << retry.min(32)).min(cap);
            // backoff randomizes each interval by up to 50%
            per_feed = per_feed.saturating_add(interval.saturating_add(interval / 2 + 1));
        }

        Duration::from_secs(per_feed.saturating_mul(feeds.max(1) as u64))
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

impl LlmConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key,
            timeout_seconds: 60,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"***")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// `https://github.com` in production, `file:///some/dir` in tests.
    pub remote_base: String,
    pub author_name: String,
    pub author_email: String,
    /// Parent directory for scratch clones. System temp dir when `None`.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            remote_base: "https://github.com".to_string(),
            author_name: "Blogenetes Bot".to_string(),
            author_email: "bot@blogenetes.dev".to_string(),
            scratch_dir: None,
        }
    }
}

/// Upper bound per orchestrated stage.
///
/// The summarize bound sits above the LLM client timeout so a slow LLM
/// degrades to the fallback strategy before the stage itself expires.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub fetch: Duration,
    pub summarize: Duration,
    pub publish: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(30),
            summarize: Duration::from_secs(90),
            publish: Duration::from_secs(120),
        }
    }
}

impl StageTimeouts {
    /// Extra room for the summarize stage on top of the LLM request timeout.
    pub const SUMMARIZE_GRACE_SECS: u64 = 30;

    /// Stage deadlines derived from the per-request limits of a run.
    pub fn for_run(fetch: &FetchConfig, feeds: usize, llm_timeout_secs: u64, publish_timeout_secs: u64) -> Self {
        Self {
            fetch: fetch.stage_budget(feeds),
            summarize: Duration::from_secs(llm_timeout_secs.saturating_add(Self::SUMMARIZE_GRACE_SECS)),
            publish: Duration::from_secs(publish_timeout_secs),
        }
    }
}

/// Pipeline stage names, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetching,
    Summarizing,
    Rendering,
    Publishing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetch",
            Stage::Summarizing => "summarize",
            Stage::Rendering => "render",
            Stage::Publishing => "publish",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("feed unavailable: {url}: {reason}")]
    FeedUnavailable { url: String, reason: String },

    #[error("malformed feed at {url}: {reason}")]
    FeedMalformed { url: String, reason: String },

    #[error("feeds returned no articles")]
    NoArticles,

    #[error("cannot summarize empty text")]
    EmptyInput,

    #[error("document title is empty")]
    InvalidTitle,

    #[error("missing credential: {credential}")]
    AuthMissing { credential: String },

    #[error("repository unreachable: {0}")]
    RepoUnreachable(String),

    #[error("branch not found on remote: {branch}")]
    BranchNotFound { branch: String },

    #[error("push rejected: {0}")]
    PushRejected(String),

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: Stage, seconds: u64 },

    #[error("invalid publish path: {path:?}")]
    InvalidPublishPath { path: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn feed_unavailable(url: &str, reason: impl fmt::Display) -> Self {
        Self::FeedUnavailable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn auth_missing(credential: &str) -> Self {
        Self::AuthMissing {
            credential: credential.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Terminal failure of a run, tagged with the stage that stopped it.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {cause}")]
pub struct RunFailure {
    pub stage: Stage,
    #[source]
    pub cause: PipelineError,
}
