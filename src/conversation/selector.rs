//! Speaker selection
//!
//! Two personas simply alternate. Larger groups ask the model to pick a
//! numbered candidate, falling back to a random candidate whenever the
//! answer is unusable.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::SelectionSettings;
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::persona::{Roster, MIN_PERSONAS};

use super::message::Transcript;
use super::prompt::PromptBuilder;

// ─────────────────────────────────────────────────────────────────
// Fallback
// ─────────────────────────────────────────────────────────────────

/// Source of the fallback choice when the model's answer is unusable
pub trait FallbackPicker: Send + Sync {
    /// Pick an index in `0..n`; `n` is always at least 1
    fn pick(&self, n: usize) -> usize;
}

/// Uniform random choice
#[derive(Debug, Default)]
pub struct RandomPicker;

impl FallbackPicker for RandomPicker {
    fn pick(&self, n: usize) -> usize {
        rand::thread_rng().gen_range(0..n)
    }
}

/// Parse a model answer into a 0-based candidate index.
///
/// Accepts an optional sign followed by leading digits after trimming, so
/// "2." and "2 - Bob" both select the second candidate.
pub fn parse_selection(text: &str, candidates: usize) -> Option<usize> {
    let text = text.trim();
    let (negative, rest) = match text.as_bytes().first().copied() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || negative {
        return None;
    }

    let number: usize = digits.parse().ok()?;
    (1..=candidates).contains(&number).then(|| number - 1)
}

// ─────────────────────────────────────────────────────────────────
// Selector
// ─────────────────────────────────────────────────────────────────

/// Picks who speaks next
pub struct SpeakerSelector {
    model: Arc<dyn LanguageModel>,
    settings: SelectionSettings,
    picker: Box<dyn FallbackPicker>,
}

impl SpeakerSelector {
    pub fn new(model: Arc<dyn LanguageModel>, settings: SelectionSettings) -> Self {
        Self::with_picker(model, settings, Box::new(RandomPicker))
    }

    pub fn with_picker(
        model: Arc<dyn LanguageModel>,
        settings: SelectionSettings,
        picker: Box<dyn FallbackPicker>,
    ) -> Self {
        Self {
            model,
            settings,
            picker,
        }
    }

    /// Return the id of the persona who should write the next message.
    ///
    /// Never returns `last_speaker` and always returns a roster member.
    pub async fn select(
        &self,
        transcript: &Transcript,
        roster: &Roster,
        topic: &str,
        last_speaker: Option<&str>,
    ) -> Result<String> {
        if roster.len() < MIN_PERSONAS {
            return Err(Error::RosterTooSmall {
                count: roster.len(),
            });
        }

        if roster.len() == 2 {
            if let Some(last) = last_speaker {
                return roster
                    .others(Some(last))
                    .first()
                    .map(|p| p.id.clone())
                    .ok_or_else(|| Error::SpeakerNotFound {
                        last_speaker: last.to_string(),
                    });
            }
        }

        let candidates = roster.others(last_speaker);
        if candidates.is_empty() {
            return Err(Error::SpeakerNotFound {
                last_speaker: last_speaker.unwrap_or_default().to_string(),
            });
        }

        let request = CompletionRequest {
            system: PromptBuilder::build_selection_prompt(transcript, roster, topic, last_speaker),
            history: PromptBuilder::history(transcript, roster),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let index = match self.model.complete(request).await {
            Ok(answer) => match parse_selection(&answer, candidates.len()) {
                Some(index) => index,
                None => {
                    debug!(answer = %answer.trim(), "Unusable selection answer, picking at random");
                    self.picker.pick(candidates.len())
                }
            },
            Err(e) => {
                warn!(error = %e, "Selection call failed, picking at random");
                self.picker.pick(candidates.len())
            }
        };

        // A misbehaving picker still has to land on a candidate
        let chosen = candidates[index.min(candidates.len() - 1)];
        debug!(persona = %chosen.name, "Selected next speaker");
        Ok(chosen.id.clone())
    }
}
