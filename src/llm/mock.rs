//! Mock language model for testing
//!
//! Replies from scripted queues so conversations are deterministic.
//! Also selectable at runtime with `provider = "mock"` for offline demos.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Semaphore;

use crate::error::{Error, Result};

use super::traits::{CompletionRequest, LanguageModel, TextStream};

// ─────────────────────────────────────────────────────────────────
// Mock Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock model behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Answers for `complete`, consumed in order. "1" once exhausted.
    pub selection_responses: Vec<String>,

    /// Answers for `complete_stream`, consumed in order. A numbered
    /// placeholder message once exhausted.
    pub generation_responses: Vec<String>,

    /// Simulated latency per streamed token (ms)
    pub token_latency_ms: u64,

    /// Whether to fail on certain operations
    pub fail_complete: bool,
    pub fail_stream: bool,

    /// When set, `complete_stream` waits for a permit before answering
    pub stream_gate: Option<Arc<Semaphore>>,
}

// ─────────────────────────────────────────────────────────────────
// Mock Model
// ─────────────────────────────────────────────────────────────────

/// Scripted implementation of [`LanguageModel`]
pub struct MockModel {
    config: MockConfig,
    selections: Mutex<VecDeque<String>>,
    generations: Mutex<VecDeque<String>>,
    call_counts: RwLock<CallCounts>,
    requests: RwLock<Vec<CompletionRequest>>,
}

/// Track method call counts for verification
#[derive(Debug, Default)]
struct CallCounts {
    complete: u32,
    complete_stream: u32,
}

impl MockModel {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            selections: Mutex::new(config.selection_responses.iter().cloned().collect()),
            generations: Mutex::new(config.generation_responses.iter().cloned().collect()),
            config,
            call_counts: RwLock::new(CallCounts::default()),
            requests: RwLock::new(Vec::new()),
        }
    }

    /// Get the number of times a method was called
    pub fn call_count(&self, method: &str) -> u32 {
        let counts = self.call_counts.read();
        match method {
            "complete" => counts.complete,
            "complete_stream" => counts.complete_stream,
            _ => 0,
        }
    }

    /// Every request received so far, in order
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.read().clone()
    }

    fn record(&self, request: CompletionRequest) {
        self.requests.write().push(request);
    }

    /// Split text into word tokens, keeping the separating space on each
    fn tokenize(text: &str) -> Vec<String> {
        text.split_inclusive(' ').map(str::to_string).collect()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.call_counts.write().complete += 1;
        self.record(request);

        if self.config.fail_complete {
            return Err(Error::provider_unavailable("mock://", "simulated selection failure"));
        }

        Ok(self
            .selections
            .lock()
            .pop_front()
            .unwrap_or_else(|| "1".to_string()))
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<TextStream> {
        let call = {
            let mut counts = self.call_counts.write();
            counts.complete_stream += 1;
            counts.complete_stream
        };
        self.record(request);

        if let Some(gate) = &self.config.stream_gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| Error::Internal("mock stream gate closed".to_string()))?;
            permit.forget();
        }

        if self.config.fail_stream {
            return Err(Error::provider_unavailable("mock://", "simulated generation failure"));
        }

        let text = self
            .generations
            .lock()
            .pop_front()
            .unwrap_or_else(|| format!("This is scripted message number {}.", call));

        let latency = Duration::from_millis(self.config.token_latency_ms);
        let tokens = Self::tokenize(&text);

        let stream = futures_util::stream::unfold(tokens.into_iter(), move |mut tokens| async move {
            let token = tokens.next()?;
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            Some((Ok::<_, Error>(token), tokens))
        });

        Ok(Box::pin(stream))
    }
}
