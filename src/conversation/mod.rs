//! Conversation core: prompts, speaker selection, generation and the
//! controller that ties them into a running simulation.

pub mod controller;
pub mod generator;
pub mod message;
pub mod prompt;
pub mod selector;

pub use controller::{
    ConversationController, ConversationEvent, ConversationState, SimulationStatus, StepOutcome,
};
pub use generator::MessageGenerator;
pub use message::{ChatMessage, Role, Transcript};
pub use prompt::PromptBuilder;
pub use selector::{parse_selection, FallbackPicker, RandomPicker, SpeakerSelector};
