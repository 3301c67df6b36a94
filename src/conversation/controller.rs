//! Conversation controller
//!
//! Owns the simulation state machine and schedules steps:
//!
//! ```text
//! Idle ──start──▶ Running ◀──start/pause──▶ Paused
//!                    │
//!                    └──(cap reached)──▶ Stopped
//! ```
//!
//! `reset` returns any state to Idle. Every reset bumps an epoch counter;
//! a step that finishes under an older epoch is dropped instead of being
//! appended.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::SimulationSettings;
use crate::error::Result;
use crate::persona::Roster;

use super::generator::MessageGenerator;
use super::message::{ChatMessage, Transcript};
use super::selector::SpeakerSelector;

const EVENT_CAPACITY: usize = 1024;

// ─────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────

/// Simulation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    Idle,
    Running,
    Paused,
    /// Cap reached; cannot be resumed until reset
    Stopped,
}

impl std::fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of the conversation state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub transcript: Transcript,
    pub last_speaker_id: Option<String>,
    pub iteration_count: u32,
    pub cap: u32,
    pub running: bool,
    pub status: SimulationStatus,

    /// A step is in flight
    pub busy: bool,
}

/// Notification sent to subscribers as the conversation progresses
#[derive(Debug, Clone)]
pub enum ConversationEvent {
    Started,
    Paused,
    Reset,
    /// A speaker was chosen and generation began
    StepStarted { persona_id: String, persona_name: String },
    /// A fragment of the message being generated
    Token { persona_id: String, text: String },
    MessageAppended {
        message: ChatMessage,
        iteration: u32,
        cap: u32,
    },
    /// The step produced no message
    StepFailed { persona_id: Option<String>, error: String },
    /// A step finished after a reset and was dropped
    StepDiscarded,
    /// The iteration cap was reached
    Stopped { iterations: u32 },
}

/// Result of a single `step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Appended,
    Failed,
    Discarded,
    /// Not running, or another step is in flight
    Skipped,
}

// ─────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────

struct Inner {
    status: SimulationStatus,
    transcript: Transcript,
    last_speaker_id: Option<String>,
    iteration_count: u32,
    busy: bool,
    epoch: u64,
    /// Epoch of the live scheduler task, if any
    scheduler_epoch: Option<u64>,
}

struct Shared {
    roster: Roster,
    topic: String,
    selector: SpeakerSelector,
    generator: MessageGenerator,
    inner: Mutex<Inner>,
    cap: u32,
    step_delay: Duration,
    events: broadcast::Sender<ConversationEvent>,
}

impl Shared {
    fn emit(&self, event: ConversationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Drives a simulated conversation between the roster's personas
#[derive(Clone)]
pub struct ConversationController {
    shared: Arc<Shared>,
}

impl ConversationController {
    /// Create a controller. The roster must have at least two personas.
    pub fn new(
        roster: Roster,
        topic: impl Into<String>,
        selector: SpeakerSelector,
        generator: MessageGenerator,
        settings: &SimulationSettings,
    ) -> Result<Self> {
        roster.ensure_ready()?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Shared {
            roster,
            topic: topic.into(),
            selector,
            generator,
            inner: Mutex::new(Inner {
                status: SimulationStatus::Idle,
                transcript: Transcript::new(),
                last_speaker_id: None,
                iteration_count: 0,
                busy: false,
                epoch: 0,
                scheduler_epoch: None,
            }),
            cap: settings.max_iterations.max(1),
            step_delay: Duration::from_millis(settings.step_delay_ms),
            events,
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn roster(&self) -> &Roster {
        &self.shared.roster
    }

    pub fn topic(&self) -> &str {
        &self.shared.topic
    }

    pub fn cap(&self) -> u32 {
        self.shared.cap
    }

    /// Receive state-change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> ConversationState {
        let inner = self.shared.inner.lock();
        ConversationState {
            transcript: inner.transcript.clone(),
            last_speaker_id: inner.last_speaker_id.clone(),
            iteration_count: inner.iteration_count,
            cap: self.shared.cap,
            running: inner.status == SimulationStatus::Running,
            status: inner.status,
            busy: inner.busy,
        }
    }

    /// Start or resume the simulation.
    ///
    /// Returns false when the cap has been reached. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) -> bool {
        let spawn_epoch = {
            let mut inner = self.shared.inner.lock();
            if inner.iteration_count >= self.shared.cap
                || inner.status == SimulationStatus::Stopped
            {
                return false;
            }
            if inner.status == SimulationStatus::Running {
                return true;
            }
            inner.status = SimulationStatus::Running;

            let epoch = inner.epoch;
            if inner.scheduler_epoch == Some(epoch) {
                None
            } else {
                inner.scheduler_epoch = Some(epoch);
                Some(epoch)
            }
        };

        info!(cap = self.shared.cap, "Simulation started");
        self.shared.emit(ConversationEvent::Started);

        if let Some(epoch) = spawn_epoch {
            let controller = self.clone();
            tokio::spawn(async move { controller.run_scheduler(epoch).await });
        }
        true
    }

    /// Stop scheduling new steps. A step in flight still completes.
    pub fn pause(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.status != SimulationStatus::Running {
                return;
            }
            inner.status = SimulationStatus::Paused;
        }
        info!("Simulation paused");
        self.shared.emit(ConversationEvent::Paused);
    }

    /// Clear the conversation and return to Idle
    pub fn reset(&self) {
        {
            let mut inner = self.shared.inner.lock();
            inner.epoch += 1;
            inner.status = SimulationStatus::Idle;
            inner.transcript.clear();
            inner.last_speaker_id = None;
            inner.iteration_count = 0;
            inner.busy = false;
            inner.scheduler_epoch = None;
        }
        info!("Simulation reset");
        self.shared.emit(ConversationEvent::Reset);
    }

    /// Run one step if the simulation is running and idle between steps
    pub async fn step(&self) -> StepOutcome {
        self.run_step(None).await
    }

    async fn run_scheduler(&self, epoch: u64) {
        debug!(epoch, "Scheduler started");
        loop {
            tokio::time::sleep(self.shared.step_delay).await;
            if self.shared.step_delay.is_zero() {
                tokio::task::yield_now().await;
            }

            {
                let mut inner = self.shared.inner.lock();
                if inner.epoch != epoch || inner.status != SimulationStatus::Running {
                    if inner.scheduler_epoch == Some(epoch) {
                        inner.scheduler_epoch = None;
                    }
                    debug!(epoch, "Scheduler exiting");
                    return;
                }
            }

            self.run_step(Some(epoch)).await;
        }
    }

    async fn run_step(&self, expected_epoch: Option<u64>) -> StepOutcome {
        let shared = &self.shared;

        let (epoch, transcript, last_speaker) = {
            let mut inner = shared.inner.lock();
            let stale = expected_epoch.map_or(false, |e| e != inner.epoch);
            if stale || inner.status != SimulationStatus::Running || inner.busy {
                return StepOutcome::Skipped;
            }
            inner.busy = true;
            (
                inner.epoch,
                inner.transcript.clone(),
                inner.last_speaker_id.clone(),
            )
        };

        let selected = shared
            .selector
            .select(&transcript, &shared.roster, &shared.topic, last_speaker.as_deref())
            .await;

        let speaker = match selected.and_then(|id| shared.roster.resolve(&id).cloned()) {
            Ok(speaker) => speaker,
            Err(e) => {
                warn!(error = %e, "Speaker selection failed");
                let outcome = self.finish_failed(epoch, None, e.to_string());
                // Setup problems will not fix themselves on the next tick
                if e.is_configuration() && outcome == StepOutcome::Failed {
                    self.pause();
                }
                return outcome;
            }
        };

        if shared.inner.lock().epoch != epoch {
            return self.discard();
        }

        debug!(persona = %speaker.name, "Step started");
        shared.emit(ConversationEvent::StepStarted {
            persona_id: speaker.id.clone(),
            persona_name: speaker.name.clone(),
        });

        let generated = shared
            .generator
            .generate(&transcript, &shared.roster, &shared.topic, &speaker, |chunk| {
                if shared.inner.lock().epoch == epoch {
                    shared.emit(ConversationEvent::Token {
                        persona_id: speaker.id.clone(),
                        text: chunk.to_string(),
                    });
                }
            })
            .await;

        let text = match generated {
            Ok(text) => text,
            Err(e) => {
                warn!(persona = %speaker.name, error = %e, "Message generation failed");
                return self.finish_failed(epoch, Some(speaker.id.clone()), e.to_string());
            }
        };

        let message = ChatMessage::assistant(&speaker, text);
        let (iteration, reached_cap) = {
            let mut inner = shared.inner.lock();
            if inner.epoch != epoch {
                drop(inner);
                return self.discard();
            }
            inner.busy = false;
            inner.transcript.push(message.clone());
            inner.iteration_count += 1;
            inner.last_speaker_id = Some(speaker.id.clone());
            debug_assert_eq!(
                inner.iteration_count as usize,
                inner.transcript.assistant_count()
            );

            let reached_cap = inner.iteration_count >= shared.cap;
            if reached_cap {
                inner.status = SimulationStatus::Stopped;
            }
            (inner.iteration_count, reached_cap)
        };

        info!(
            persona = %speaker.name,
            iteration,
            cap = shared.cap,
            "Message appended"
        );
        shared.emit(ConversationEvent::MessageAppended {
            message,
            iteration,
            cap: shared.cap,
        });

        if reached_cap {
            info!(iterations = iteration, "Iteration cap reached, simulation stopped");
            shared.emit(ConversationEvent::Stopped {
                iterations: iteration,
            });
        }

        StepOutcome::Appended
    }

    fn finish_failed(&self, epoch: u64, persona_id: Option<String>, error: String) -> StepOutcome {
        {
            let mut inner = self.shared.inner.lock();
            if inner.epoch != epoch {
                drop(inner);
                return self.discard();
            }
            inner.busy = false;
        }
        self.shared
            .emit(ConversationEvent::StepFailed { persona_id, error });
        StepOutcome::Failed
    }

    fn discard(&self) -> StepOutcome {
        debug!("Dropping result of a step from before the last reset");
        self.shared.emit(ConversationEvent::StepDiscarded);
        StepOutcome::Discarded
    }
}
