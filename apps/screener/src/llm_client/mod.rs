/// LLM Client: the single point of entry for chat-completion calls.
///
/// Talks to an OpenAI-compatible endpoint (DeepSeek by default). No other
/// module builds LLM requests; screening code depends on the
/// [`CandidateAnalyzer`] trait implemented here.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::models::Job;

pub mod parser;
pub mod prompts;

pub use parser::{AnalysisParser, AnalysisReport, SectionParser};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;
const MAX_ATTEMPTS: u32 = 5;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is missing; set DEEPSEEK_API_KEY")]
    MissingCredential,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM request timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed completion response: {0}")]
    Malformed(String),
}

impl LlmError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Timeout { .. })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Produces a summary, opinion and score for one résumé against one job.
#[async_trait]
pub trait CandidateAnalyzer: Send + Sync {
    async fn analyze(&self, resume_text: &str, job: &Job) -> Result<AnalysisReport, LlmError>;
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    backoff: Duration,
    parser: Arc<dyn AnalysisParser>,
}

impl LlmClient {
    /// Fails with `MissingCredential` when the key is absent or blank.
    pub fn new(api_key: Option<String>) -> Result<Self, LlmError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingCredential)?;

        Ok(Self {
            client: build_http_client(
                Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
                Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            )?,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            parser: Arc::new(SectionParser),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Base delay before the second attempt; doubles on each further attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Result<Self, LlmError> {
        self.client = build_http_client(connect, request)?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One chat completion with a single user message. Returns the trimmed
    /// reply text, which may be empty.
    ///
    /// Only timeouts are retried (up to 5 attempts, exponential backoff);
    /// every other failure is returned on the spot.
    pub async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };
        let url = format!("{}/chat/completions", self.base_url);

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let delay = self
                    .backoff
                    .saturating_mul(1 << (attempt - 2))
                    .min(MAX_BACKOFF);
                warn!(
                    "LLM call attempt {} timed out, retrying after {}ms...",
                    attempt - 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_timeout() => continue,
                Err(e) => {
                    error!("LLM API transport error: {e}");
                    return Err(LlmError::Http(e));
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorBody>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                error!("LLM API returned {status}: {message}");
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let completion: ChatResponse = match response.json().await {
                Ok(c) => c,
                Err(e) if e.is_timeout() => continue,
                Err(e) => return Err(LlmError::Malformed(e.to_string())),
            };

            if let Some(usage) = &completion.usage {
                debug!(
                    "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            let choice = completion
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| LlmError::Malformed("no choices in response".to_string()))?;

            return Ok(choice.message.content.unwrap_or_default().trim().to_string());
        }

        error!("LLM call timed out {MAX_ATTEMPTS} times, giving up");
        Err(LlmError::Timeout {
            attempts: MAX_ATTEMPTS,
        })
    }
}

#[async_trait]
impl CandidateAnalyzer for LlmClient {
    /// Combined summary, opinion and score in a single call.
    async fn analyze(&self, resume_text: &str, job: &Job) -> Result<AnalysisReport, LlmError> {
        let reply = self
            .generate(
                &prompts::analysis_prompt(resume_text, &job.prompt_context()),
                0.4,
                5000,
            )
            .await?;
        Ok(self.parser.parse(&reply))
    }
}

fn build_http_client(connect: Duration, request: Duration) -> Result<Client, LlmError> {
    Ok(Client::builder()
        .connect_timeout(connect)
        .timeout(request)
        .build()?)
}
