//! Message generation
//!
//! Streams one message from the model in the voice of a chosen persona.

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::debug;

use crate::config::GenerationSettings;
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::persona::{Persona, Roster};

use super::message::Transcript;
use super::prompt::PromptBuilder;

/// Writes the next message for a persona
pub struct MessageGenerator {
    model: Arc<dyn LanguageModel>,
    settings: GenerationSettings,
}

impl MessageGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, settings: GenerationSettings) -> Self {
        Self { model, settings }
    }

    /// Generate a message as `speaker`, passing each fragment to `on_chunk`
    /// as it arrives. Returns the full text.
    ///
    /// Failures propagate unchanged; nothing is retried here.
    pub async fn generate<F>(
        &self,
        transcript: &Transcript,
        roster: &Roster,
        topic: &str,
        speaker: &Persona,
        mut on_chunk: F,
    ) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        let request = CompletionRequest {
            system: PromptBuilder::build_generation_prompt(transcript, roster, topic, speaker),
            history: PromptBuilder::history(transcript, roster),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let mut stream = self.model.complete_stream(request).await?;
        let mut text = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            on_chunk(&chunk);
            text.push_str(&chunk);
        }

        if text.trim().is_empty() {
            return Err(Error::EmptyCompletion {
                persona: speaker.name.clone(),
            });
        }

        debug!(persona = %speaker.name, chars = text.len(), "Generated message");
        Ok(text)
    }
}
