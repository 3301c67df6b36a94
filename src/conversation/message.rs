//! Chat messages and the transcript they form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::HistoryRole;
use crate::persona::Persona;

/// Author role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl From<Role> for HistoryRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => HistoryRole::User,
            Role::Assistant => HistoryRole::Assistant,
        }
    }
}

/// One message in the conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,

    pub role: Role,

    pub content: String,

    /// Author, if the message came from a persona
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,

    /// Author name cached at creation, kept if the persona is later removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_name: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// A message written by `persona`
    pub fn assistant(persona: &Persona, content: impl Into<String>) -> Self {
        Self {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            role: Role::Assistant,
            content: content.into(),
            persona_id: Some(persona.id.clone()),
            persona_name: Some(persona.name.clone()),
            created_at: Utc::now(),
        }
    }
}

/// Ordered, append-only sequence of messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Number of persona-authored messages
    pub fn assistant_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
