use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::{LlmError, Result};
use super::prompt::{self, ChatMessage};
use super::rate_limit;
use crate::blocks::BuildingBlock;
use crate::config::{AnalysisConfig, LlmConfig, TokenBudget};
use crate::sanitize::truncate_body;

/// Outcome of a request that reached the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// HTTP 429. The caller decides whether to wait and try again.
    RateLimited { retry_after: Duration },
}

/// Sends teaser text to the analysis model.
///
/// Implementations never retry on their own; a 429 is reported as
/// [`Reply::RateLimited`].
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Whether credentials are available. Without them every request fails
    /// with [`LlmError::MissingCredentials`].
    fn is_configured(&self) -> bool;

    /// One request for all `blocks`; the reply holds one section per block.
    async fn analyze_batch(&self, text: &str, blocks: &[&BuildingBlock]) -> Result<Reply>;

    /// One request for a single block.
    async fn analyze_block(&self, text: &str, block: &BuildingBlock) -> Result<Reply>;
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiClient {
    client: Client,
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    temperature: f32,
    budget: TokenBudget,
    batch_timeout: Duration,
    block_timeout: Duration,
    fallback_retry_after: Duration,
}

impl OpenAiClient {
    pub fn new(
        llm: &LlmConfig,
        analysis: &AnalysisConfig,
        api_key: Option<SecretString>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(llm.connect_timeout_secs))
            .build()
            .map_err(|e| LlmError::ClientBuild(e.to_string()))?;

        if api_key.is_none() {
            info!("No LLM API key configured; analysis will be skipped");
        }

        Ok(Self {
            client,
            api_key,
            endpoint: llm.base_url.clone(),
            model: llm.model.clone(),
            temperature: llm.temperature,
            budget: llm.max_tokens,
            batch_timeout: Duration::from_secs(llm.batch_timeout_secs),
            block_timeout: Duration::from_secs(llm.block_timeout_secs),
            fallback_retry_after: Duration::from_secs(analysis.fallback_retry_after_secs),
        })
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: Option<u32>,
        timeout: Duration,
    ) -> Result<Reply> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::MissingCredentials)?;

        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(
            model = %self.model,
            prompt_chars,
            max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(e, timeout))?;

        let status = response.status().as_u16();
        let retry_after_header = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body_text = response
            .text()
            .await
            .map_err(|e| request_error(e, timeout))?;

        interpret_response(
            status,
            &body_text,
            retry_after_header.as_deref(),
            self.fallback_retry_after,
        )
    }
}

#[async_trait]
impl AnalysisClient for OpenAiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn analyze_batch(&self, text: &str, blocks: &[&BuildingBlock]) -> Result<Reply> {
        let max_tokens = self.budget.for_blocks(blocks.len());
        self.complete(
            prompt::batch_messages(text, blocks),
            Some(max_tokens),
            self.batch_timeout,
        )
        .await
    }

    async fn analyze_block(&self, text: &str, block: &BuildingBlock) -> Result<Reply> {
        self.complete(prompt::block_messages(text, block), None, self.block_timeout)
            .await
    }
}

fn request_error(e: reqwest::Error, timeout: Duration) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Network(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Maps a raw HTTP response onto a [`Reply`] or an error.
pub(crate) fn interpret_response(
    status: u16,
    body: &str,
    retry_after_header: Option<&str>,
    fallback_retry_after: Duration,
) -> Result<Reply> {
    match status {
        200..=299 => {
            let parsed: ChatResponse =
                serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message)
                .and_then(|m| m.content)
                .filter(|c| !c.trim().is_empty())
                .ok_or(LlmError::EmptyResponse)?;
            debug!(response_chars = content.len(), "Received chat completion");
            Ok(Reply::Text(content))
        }
        429 => {
            let retry_after =
                rate_limit::retry_wait(body, retry_after_header, fallback_retry_after);
            warn!(retry_after_ms = retry_after.as_millis() as u64, "Rate limited by LLM service");
            Ok(Reply::RateLimited { retry_after })
        }
        _ => Err(LlmError::Http {
            status,
            body: truncate_body(body),
        }),
    }
}
