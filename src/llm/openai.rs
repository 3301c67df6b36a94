//! OpenAI-compatible chat completions provider
//!
//! Works with any endpoint that speaks the `/chat/completions` protocol
//! (OpenAI, Ollama, vLLM, LM Studio, etc.). Streaming uses server-sent
//! events terminated by `data: [DONE]`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LlmSettings;
use crate::error::{Error, Result};

use super::traits::{CompletionRequest, HistoryMessage, HistoryRole, LanguageModel, TextStream};

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for an OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API base URL (e.g., "https://api.openai.com/v1", "http://localhost:11434/v1")
    pub base_url: String,

    /// API key (empty string for local servers like Ollama)
    pub api_key: String,

    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retries while establishing a request
    pub max_retries: u32,
}

impl From<&LlmSettings> for OpenAiConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            timeout_secs: settings.timeout_secs,
            max_retries: settings.max_retries,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// OpenAI API types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<HistoryMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

// ─────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────

/// OpenAI-compatible chat completions client
pub struct OpenAiModel {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiModel {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            "OpenAI-compatible provider created"
        );

        Ok(Self { config, client })
    }

    /// Build the authorization header value (if API key is set)
    fn auth_header(&self) -> Option<String> {
        if self.config.api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.config.api_key))
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn body<'a>(&'a self, request: &CompletionRequest, stream: bool) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(HistoryMessage {
            role: HistoryRole::System,
            content: request.system.clone(),
        });
        messages.extend(request.history.iter().cloned());

        ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
        }
    }

    /// Send a request, retrying while the provider is unreachable or busy.
    ///
    /// Only establishing the response is retried; a successful response is
    /// handed back untouched so streaming bodies are never replayed.
    async fn send(&self, body: &ChatCompletionRequest<'_>) -> Result<reqwest::Response> {
        let url = self.url();
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
                debug!(attempt, ?backoff, "Retrying after error");
                tokio::time::sleep(backoff).await;
            }

            let mut req = self.client.post(&url).json(body);
            if let Some(ref auth) = self.auth_header() {
                req = req.header("Authorization", auth);
            }

            let err = match req.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let text = response.text().await.unwrap_or_default();
                    Error::provider_status(status, text)
                }
                Err(e) => self.transport_error(e),
            };

            if !err.is_retryable() {
                return Err(err);
            }
            warn!(attempt, error = %err, "Retryable provider error");
            last_error = Some(err);
        }

        Err(last_error.unwrap_or_else(|| Error::provider_unavailable(&url, "all retry attempts exhausted")))
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::ProviderTimeout {
                url: self.url(),
                timeout_secs: self.config.timeout_secs,
            }
        } else {
            Error::provider_unavailable(self.url(), e.to_string())
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = self.body(&request, false);
        let response = self.send(&body).await?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::provider_response(format!("Failed to parse response: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider_response("No choices in API response"))?
            .message
            .content
            .unwrap_or_default();

        Ok(text)
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<TextStream> {
        let body = self.body(&request, true);
        let response = self.send(&body).await?;
        let url = self.url();

        let stream = response
            .bytes_stream()
            .scan(SseDecoder::default(), move |decoder, chunk| {
                let items = if decoder.finished {
                    None
                } else {
                    Some(match chunk {
                        Ok(bytes) => decoder.push(&bytes),
                        Err(e) => {
                            decoder.finished = true;
                            vec![Err(Error::provider_unavailable(&url, e.to_string()))]
                        }
                    })
                };
                futures_util::future::ready(items)
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(stream))
    }
}

// ─────────────────────────────────────────────────────────────────
// SSE decoding
// ─────────────────────────────────────────────────────────────────

/// Incremental decoder for `data:` lines of a chat completion stream
#[derive(Default)]
struct SseDecoder {
    buffer: String,
    utf8_pending: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    /// Feed raw bytes, returning the text fragments they complete
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<String>> {
        self.utf8_pending.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.utf8_pending) {
            Ok(text) => text.len(),
            // Invalid bytes are replaced rather than held forever
            Err(e) if e.error_len().is_some() => self.utf8_pending.len(),
            Err(e) => e.valid_up_to(),
        };
        // A multi-byte character may be split across chunks
        let text = String::from_utf8_lossy(&self.utf8_pending[..valid_up_to]).into_owned();
        self.buffer.push_str(&text);
        self.utf8_pending.drain(..valid_up_to);

        let mut fragments = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            if self.finished {
                continue;
            }
            if let Some(fragment) = self.parse_line(line.trim_end_matches(['\r', '\n'])) {
                fragments.push(Ok(fragment));
            }
        }
        fragments
    }

    fn parse_line(&mut self, line: &str) -> Option<String> {
        let payload = line.strip_prefix("data:")?.trim_start();
        if payload == "[DONE]" {
            self.finished = true;
            return None;
        }

        match serde_json::from_str::<ChatCompletionChunk>(payload) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty()),
            Err(e) => {
                debug!(error = %e, "Skipping unparseable stream event");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
