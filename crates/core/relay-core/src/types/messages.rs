//! Conversation messages and the session they belong to

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One conversation bound to one external agent session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub session_id: String,
    pub user_id: String,
    pub app_name: String,
}

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Human,
    Ai,
}

/// One turn in the conversation
///
/// Human messages are complete on creation. AI messages start as an empty
/// placeholder and are rewritten while their stream is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// A finished human message
    pub fn human(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MessageKind::Human,
            content: content.into(),
            agent: None,
            timestamp: Utc::now(),
        }
    }

    /// An empty AI placeholder waiting for stream output
    pub fn ai_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MessageKind::Ai,
            content: String::new(),
            agent: Some(String::new()),
            timestamp: Utc::now(),
        }
    }

    /// A complete AI message
    pub fn ai(id: impl Into<String>, content: impl Into<String>, agent: Option<String>) -> Self {
        Self {
            id: id.into(),
            kind: MessageKind::Ai,
            content: content.into(),
            agent,
            timestamp: Utc::now(),
        }
    }

    pub fn is_ai(&self) -> bool {
        self.kind == MessageKind::Ai
    }

    /// Attribution worth displaying (empty names are treated as absent)
    pub fn agent_name(&self) -> Option<&str> {
        self.agent.as_deref().filter(|a| !a.is_empty())
    }
}
