use crate::types::{LlmConfig, PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You are an expert at summarizing content and extracting key points.";

/// Trait for LLM backends that answer a single prompt
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Get the name of this LLM adapter
    fn adapter_name(&self) -> String;

    /// Send one prompt and return the raw text reply.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completion adapter.
pub struct OpenAiAdapter {
    client: Client,
    config: LlmConfig,
}

impl OpenAiAdapter {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(PipelineError::auth_missing("OPENAI_API_KEY"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build LLM client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    fn adapter_name(&self) -> String {
        format!("OpenAI ({})", self.config.model)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        debug!("Sending {} character prompt to {}", prompt.len(), self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Llm(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Llm(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Llm(format!("unreadable response: {}", e)))?;

        let reply = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PipelineError::Llm("no completion choices returned".to_string()))?;

        info!("Received {} character reply from {}", reply.len(), self.adapter_name());
        Ok(reply)
    }
}

/// Scripted LLM adapter for development and testing
pub struct MockLlmAdapter {
    name: String,
    reply: std::result::Result<String, String>,
    response_delay_ms: u64,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockLlmAdapter {
    /// Adapter that always answers with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::build("replying", Ok(reply.into()))
    }

    /// Adapter whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::build("failing", Err(message.into()))
    }

    fn build(name: &str, reply: std::result::Result<String, String>) -> Self {
        Self {
            name: name.to_string(),
            reply,
            response_delay_ms: 0,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|prompt| prompt.clone())
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    fn adapter_name(&self) -> String {
        format!("Mock LLM Adapter ({})", self.name)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }

        if self.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.response_delay_ms)).await;
        }

        self.reply.clone().map_err(PipelineError::Llm)
    }
}
