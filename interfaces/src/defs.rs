use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry pulled from a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Body text. Falls back to `description` when the feed has no content.
    pub content: String,
    pub published_at: DateTime<Utc>,
}

impl Article {
    /// The text a summarizer should see for this article.
    pub fn body(&self) -> &str {
        if self.content.trim().is_empty() {
            &self.description
        } else {
            &self.content
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub original_text: String,
    pub summary: String,
    pub key_points: Vec<String>,
}

/// A rendered markdown post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    /// Render date, `YYYY-MM-DD`.
    pub date: String,
    pub body: String,
}

/// Where a document ends up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
    pub message: String,
}

impl PublishTarget {
    pub const DEFAULT_BRANCH: &'static str = "main";

    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: Self::DEFAULT_BRANCH.to_owned(),
            path: "posts/post.md".to_owned(),
            message: "New post via agent".to_owned(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Branch to write to; an empty branch means `main`.
    pub fn effective_branch(&self) -> &str {
        if self.branch.trim().is_empty() {
            Self::DEFAULT_BRANCH
        } else {
            &self.branch
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub content: String,
    pub target: PublishTarget,
    /// Opaque write credential. `None` when nothing was configured.
    pub credential: Option<String>,
}

// Hand-written so tokens never end up in logs.
impl std::fmt::Debug for PublishRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishRequest")
            .field("content_len", &self.content.len())
            .field("target", &self.target)
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .finish()
    }
}

/// What a successful publish did. Failures travel as errors, so there is no
/// partial state here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishOutcome {
    /// A commit was pushed. Identical content still yields a new commit.
    Committed { commit: String },
    /// The document was written somewhere that has no history.
    Written { location: String },
}
