//! Language model trait definitions
//!
//! The conversation core talks to the model only through [`LanguageModel`]:
//! one short blocking completion (speaker selection) and one streamed
//! completion (message generation).

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::Serialize;

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────

/// Role of a history entry as seen by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    System,
    User,
    Assistant,
}

/// One prior message passed to the model as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    pub content: String,
}

/// A single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Instruction string sent ahead of the history
    pub system: String,

    /// Conversation so far, oldest first
    pub history: Vec<HistoryMessage>,

    /// Output token budget
    pub max_tokens: u32,

    pub temperature: f32,
}

// ─────────────────────────────────────────────────────────────────
// Streaming Support
// ─────────────────────────────────────────────────────────────────

/// Lazy, finite, non-restartable sequence of text fragments.
///
/// The concatenation of all `Ok` items is the completed text. The stream
/// ends after the provider signals end of output.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// ─────────────────────────────────────────────────────────────────
// LanguageModel Trait
// ─────────────────────────────────────────────────────────────────

/// Core trait for chat completion providers
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider name (e.g., "openai", "mock")
    fn name(&self) -> &'static str;

    /// Run a completion and return the whole answer
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Run a completion and stream the answer as it is produced
    async fn complete_stream(&self, request: CompletionRequest) -> Result<TextStream>;
}
