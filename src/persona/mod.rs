//! Persona system: who takes part in a conversation.
//!
//! Personas are configured before a simulation starts and stay read-only
//! while it runs. The roster and topic are saved between runs by the
//! settings store.

pub mod roster;
pub mod store;
pub mod types;

pub use roster::{PersonaEdit, Roster, MIN_PERSONAS};
pub use store::{SettingsStore, StoredSettings};
pub use types::{Gender, Persona, PersonaColor};
