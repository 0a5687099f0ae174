use crate::llm_adapter::LlmAdapter;
use crate::traits::Summarize;
use crate::types::{PipelineError, Result, Summary};
use crate::utils::text::{first_n, split_sentences, truncate_chars};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inputs longer than this are cut before they reach the LLM.
pub const MAX_INPUT_CHARS: usize = 8000;
pub const TRUNCATION_MARKER: &str = "... [truncated]";

const SUMMARY_FALLBACK_CHARS: usize = 200;
const MIN_KEY_POINTS: usize = 3;
const FALLBACK_KEY_POINTS: usize = 3;

/// Used when no key point could be produced at all.
pub const NO_KEY_POINTS: [&str; 2] = [
    "No key points were extracted",
    "Please check the original content for details",
];

/// Summary text and key points before validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Draft {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// How a draft gets produced.
pub enum SummaryStrategy {
    /// Ask an LLM for JSON.
    Primary(Arc<dyn LlmAdapter>),
    /// First sentence as summary, next sentences as key points.
    Fallback,
}

impl SummaryStrategy {
    pub fn name(&self) -> String {
        match self {
            SummaryStrategy::Primary(llm) => format!("primary ({})", llm.adapter_name()),
            SummaryStrategy::Fallback => "fallback (sentence split)".to_string(),
        }
    }

    pub async fn draft(&self, text: &str) -> Result<Draft> {
        match self {
            SummaryStrategy::Primary(llm) => primary_draft(llm.as_ref(), text).await,
            SummaryStrategy::Fallback => Ok(fallback_draft(text)),
        }
    }
}

/// Keep the primary draft unless it failed, in which case split sentences.
pub fn select_draft(primary: Result<Draft>, text: &str) -> Draft {
    match primary {
        Ok(draft) => draft,
        Err(e) => {
            warn!("Primary summarization failed, using fallback: {}", e);
            fallback_draft(text)
        }
    }
}

pub struct Summarizer {
    primary: Option<SummaryStrategy>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmAdapter>) -> Self {
        Self {
            primary: Some(SummaryStrategy::Primary(llm)),
        }
    }

    /// Summarizer that never calls an LLM.
    pub fn fallback_only() -> Self {
        Self { primary: None }
    }

    pub async fn summarize(&self, text: &str) -> Result<Summary> {
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let draft = match &self.primary {
            Some(strategy) => {
                info!("Summarizing {} characters with {}", text.chars().count(), strategy.name());
                select_draft(strategy.draft(text).await, text)
            }
            None => fallback_draft(text),
        };

        Ok(finalize(text, draft))
    }
}

#[async_trait]
impl Summarize for Summarizer {
    async fn summarize(&self, text: &str) -> Result<Summary> {
        Summarizer::summarize(self, text).await
    }
}

/// Cut overly long input and mark the cut.
pub fn bound_input(text: &str) -> String {
    let (head, truncated) = truncate_chars(text, MAX_INPUT_CHARS);
    if truncated {
        format!("{}{}", head, TRUNCATION_MARKER)
    } else {
        head.to_string()
    }
}

pub fn build_prompt(text: &str) -> String {
    format!(
        r#"You are an expert at summarizing content and extracting key points.

Please analyze the following text and provide:
1. A concise 2-3 sentence summary
2. 3-5 key points as bullet points

Text to summarize:
{}

Format your response as a valid JSON object with this exact structure (no extra text or markdown):
{{
  "summary": "Your summary here",
  "key_points": ["Point 1", "Point 2", "Point 3"]
}}"#,
        text
    )
}

/// Slice from the first `{` to the last `}` so code fences and chatter
/// around the object are ignored.
///
/// This is a heuristic: braces in prose before or after the object produce
/// an unparsable slice, which sends the caller to the fallback strategy.
pub fn extract_json_object(reply: &str) -> &str {
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply.trim(),
    }
}

pub fn parse_reply(reply: &str) -> Result<Draft> {
    Ok(serde_json::from_str(extract_json_object(reply))?)
}

async fn primary_draft(llm: &dyn LlmAdapter, text: &str) -> Result<Draft> {
    let prompt = build_prompt(&bound_input(text));
    let reply = llm.complete(&prompt).await?;
    debug!("LLM reply: {} characters", reply.len());
    parse_reply(&reply)
}

pub fn fallback_draft(text: &str) -> Draft {
    let sentences = split_sentences(text);

    let summary = sentences.first().cloned().unwrap_or_default();
    let mut key_points: Vec<String> = sentences
        .iter()
        .skip(1)
        .take(FALLBACK_KEY_POINTS)
        .map(|sentence| format!("{}.", sentence))
        .collect();

    if key_points.is_empty() && !summary.is_empty() {
        key_points.push(first_n(&summary, 100));
    }

    Draft { summary, key_points }
}

/// Enforce the output guarantees: non-empty summary, at least three points.
pub fn finalize(text: &str, draft: Draft) -> Summary {
    let Draft { summary, key_points } = draft;

    let summary = if summary.trim().is_empty() {
        first_n(text.trim(), SUMMARY_FALLBACK_CHARS)
    } else {
        summary.trim().to_string()
    };

    let mut key_points: Vec<String> = key_points
        .into_iter()
        .map(|point| point.trim().to_string())
        .filter(|point| !point.is_empty())
        .collect();

    if key_points.is_empty() {
        key_points = NO_KEY_POINTS.iter().map(|point| point.to_string()).collect();
    }

    while key_points.len() < MIN_KEY_POINTS {
        key_points.push(format!("Additional point {}", key_points.len() + 1));
    }

    Summary {
        original_text: text.to_string(),
        summary,
        key_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_adapter::MockLlmAdapter;

    const ARTICLE: &str = "Rust 2024 ships today. It stabilizes async closures. \
        Cargo gets a new resolver! Is this the biggest edition yet? Time will tell.";

    #[tokio::test]
    async fn empty_and_blank_input_is_rejected() {
        let summarizer = Summarizer::fallback_only();
        assert!(matches!(summarizer.summarize("").await, Err(PipelineError::EmptyInput)));
        assert!(matches!(summarizer.summarize(" \n\t").await, Err(PipelineError::EmptyInput)));
    }

    #[tokio::test]
    async fn primary_reply_in_code_fence_is_used() {
        let reply = "```json\n{\"summary\": \"Rust 2024 is out.\", \"key_points\": [\"a\", \"b\", \"c\", \"d\"]}\n```";
        let llm = Arc::new(MockLlmAdapter::replying(reply));
        let summarizer = Summarizer::new(llm.clone());

        let summary = summarizer.summarize(ARTICLE).await.unwrap();

        assert_eq!(summary.summary, "Rust 2024 is out.");
        assert_eq!(summary.key_points, vec!["a", "b", "c", "d"]);
        assert_eq!(summary.original_text, ARTICLE);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_sentences() {
        let summarizer = Summarizer::new(Arc::new(MockLlmAdapter::failing("connection refused")));

        let summary = summarizer.summarize(ARTICLE).await.unwrap();

        assert_eq!(summary.summary, "Rust 2024 ships today");
        assert_eq!(
            summary.key_points,
            vec![
                "It stabilizes async closures.",
                "Cargo gets a new resolver.",
                "Is this the biggest edition yet.",
            ]
        );
    }

    #[tokio::test]
    async fn unparsable_reply_falls_back() {
        let summarizer = Summarizer::new(Arc::new(MockLlmAdapter::replying("Sure! Here is a summary.")));
        let summary = summarizer.summarize(ARTICLE).await.unwrap();
        assert_eq!(summary.summary, "Rust 2024 ships today");
    }

    #[tokio::test]
    async fn empty_fields_in_reply_are_substituted() {
        let summarizer = Summarizer::new(Arc::new(MockLlmAdapter::replying(
            r#"{"summary": "", "key_points": []}"#,
        )));

        let summary = summarizer.summarize("Tiny input").await.unwrap();

        assert_eq!(summary.summary, "Tiny input");
        assert_eq!(
            summary.key_points,
            vec![NO_KEY_POINTS[0], NO_KEY_POINTS[1], "Additional point 3"]
        );
    }

    #[tokio::test]
    async fn short_key_point_lists_are_padded() {
        let summarizer = Summarizer::new(Arc::new(MockLlmAdapter::replying(
            r#"{"summary": "S", "key_points": ["only one"]}"#,
        )));

        let summary = summarizer.summarize(ARTICLE).await.unwrap();

        assert_eq!(
            summary.key_points,
            vec!["only one", "Additional point 2", "Additional point 3"]
        );
    }

    #[tokio::test]
    async fn long_input_is_truncated_before_prompting() {
        let llm = Arc::new(MockLlmAdapter::replying(r#"{"summary": "S", "key_points": ["a","b","c"]}"#));
        let summarizer = Summarizer::new(llm.clone());
        let long_text = "word ".repeat(4000);

        summarizer.summarize(&long_text).await.unwrap();

        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains(TRUNCATION_MARKER));
        assert!(!prompt.contains(&long_text));
    }

    #[test]
    fn bound_input_leaves_short_text_alone() {
        assert_eq!(bound_input("short"), "short");
        let long = "é".repeat(MAX_INPUT_CHARS + 1);
        let bounded = bound_input(&long);
        assert!(bounded.ends_with(TRUNCATION_MARKER));
        assert_eq!(bounded.chars().count(), MAX_INPUT_CHARS + TRUNCATION_MARKER.len());
    }

    #[test]
    fn json_extraction_spans_outermost_braces() {
        let reply = "Here you go:\n{\"summary\": \"x\", \"key_points\": [\"{nested}\"]}\nThanks";
        let draft = parse_reply(reply).unwrap();
        assert_eq!(draft.key_points, vec!["{nested}"]);

        assert!(parse_reply("no braces at all").is_err());
        assert!(parse_reply("} backwards {").is_err());
    }

    #[test]
    fn fallback_on_single_sentence_reuses_summary() {
        let draft = fallback_draft("Just one sentence without a period");
        assert_eq!(draft.summary, "Just one sentence without a period");
        assert_eq!(draft.key_points, vec!["Just one sentence without a period"]);
    }

    #[test]
    fn punctuation_only_input_still_gets_a_summary() {
        let summary = finalize("?!...", fallback_draft("?!..."));
        assert_eq!(summary.summary, "?!...");
        assert_eq!(summary.key_points.len(), 3);
    }

    #[test]
    fn long_input_summary_substitute_is_capped() {
        let text = "x".repeat(500);
        let summary = finalize(&text, Draft::default());
        assert_eq!(summary.summary, format!("{}...", "x".repeat(200)));
    }
}
