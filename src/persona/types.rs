//! Core types for the persona system.
//!
//! A persona is one simulated participant: a name, a short description the
//! model role-plays from, a display color and an optional gender tag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Display Color
// ─────────────────────────────────────────────────────────────────

/// The eight colors personas cycle through, in assignment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaColor {
    Blue,
    Yellow,
    Green,
    Purple,
    Cyan,
    Red,
    Pink,
    Orange,
}

impl PersonaColor {
    /// All colors in assignment order.
    pub const ALL: [PersonaColor; 8] = [
        PersonaColor::Blue,
        PersonaColor::Yellow,
        PersonaColor::Green,
        PersonaColor::Purple,
        PersonaColor::Cyan,
        PersonaColor::Red,
        PersonaColor::Pink,
        PersonaColor::Orange,
    ];

    /// Color for the persona at `index` in the roster (wraps after eight).
    pub fn for_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            PersonaColor::Blue => "Blue",
            PersonaColor::Yellow => "Yellow",
            PersonaColor::Green => "Green",
            PersonaColor::Purple => "Purple",
            PersonaColor::Cyan => "Cyan",
            PersonaColor::Red => "Red",
            PersonaColor::Pink => "Pink",
            PersonaColor::Orange => "Orange",
        }
    }

    /// ANSI foreground escape sequence for terminal output.
    pub fn ansi(&self) -> &'static str {
        match self {
            PersonaColor::Blue => "\x1b[34m",
            PersonaColor::Yellow => "\x1b[33m",
            PersonaColor::Green => "\x1b[32m",
            PersonaColor::Purple => "\x1b[35m",
            PersonaColor::Cyan => "\x1b[36m",
            PersonaColor::Red => "\x1b[31m",
            PersonaColor::Pink => "\x1b[95m",
            PersonaColor::Orange => "\x1b[38;5;208m",
        }
    }

    /// Wrap `text` in this color.
    pub fn paint(&self, text: &str) -> String {
        format!("{}{}\x1b[0m", self.ansi(), text)
    }
}

impl fmt::Display for PersonaColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─────────────────────────────────────────────────────────────────
// Gender
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "m" | "male" => Ok(Gender::Male),
            "f" | "female" => Ok(Gender::Female),
            other => Err(Error::persona_invalid(format!(
                "Unknown gender '{}'. Use m or f",
                other
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona
// ─────────────────────────────────────────────────────────────────

/// A simulated conversation participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Opaque identifier, never reused once the persona is removed
    pub id: String,

    pub name: String,

    /// Personality the model role-plays from
    pub description: String,

    pub color: PersonaColor,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

impl Persona {
    /// Create a persona with a freshly generated id.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        color: PersonaColor,
        gender: Option<Gender>,
    ) -> Self {
        Self {
            id: format!("persona-{}", uuid::Uuid::new_v4()),
            name: name.into(),
            description: description.into(),
            color,
            gender,
        }
    }

    /// Create a persona with a caller-chosen id.
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        color: PersonaColor,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            color,
            gender: None,
        }
    }

    /// Name rendered in the persona's display color.
    pub fn colored_name(&self) -> String {
        self.color.paint(&self.name)
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.description)
    }
}
