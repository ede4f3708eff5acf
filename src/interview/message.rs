//! Conversation transcript: messages, roles, sources and the greeting.
//!
//! The [`Transcript`] is the only channel through which the session talks to
//! the user: interview questions and error advisories alike are appended as
//! assistant messages.  It never stores two adjacent identical messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// How a message entered the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Voice,
    Text,
}

/// One exchange unit in the conversation.  Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub source: Source,
    pub timestamp: DateTime<Utc>,
}

impl SessionMessage {
    fn new(role: Role, content: impl Into<String>, source: Source) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            source,
            timestamp: Utc::now(),
        }
    }

    /// A candidate answer, spoken or typed.
    pub fn user(content: impl Into<String>, source: Source) -> Self {
        Self::new(Role::User, content, source)
    }

    /// An interviewer utterance.  Advisories use this constructor too.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Source::Voice)
    }

    fn same_payload(&self, other: &SessionMessage) -> bool {
        self.role == other.role && self.source == other.source && self.content == other.content
    }
}

/// Insertion-ordered message sequence with adjacent-duplicate suppression.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<SessionMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` unless it repeats the last one's role, source and
    /// content.  Returns `true` when the message was stored.
    pub fn push(&mut self, message: SessionMessage) -> bool {
        if let Some(last) = self.messages.last() {
            if last.same_payload(&message) {
                log::debug!("transcript: suppressed duplicate {:?} message", message.role);
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[SessionMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&SessionMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Greeting
// ---------------------------------------------------------------------------

const GREETING_WITH_CONTEXT: &str = "Welcome to your AI-powered interview session. I've reviewed your background and the role details. Could you start by walking me through the experience that best aligns with this position?";

const GREETING_WITHOUT_CONTEXT: &str = "Welcome to your AI-powered interview session. Let's begin with a quick introduction. Could you tell me about your current role and what interests you about new opportunities?";

/// Opening line spoken when a session starts.
pub fn greeting_text(has_cv: bool, has_job_posting: bool, candidate_name: &str) -> String {
    let name = candidate_name.trim();
    let prefix = if name.is_empty() {
        "Hello!".to_string()
    } else {
        format!("Hello {name}!")
    };
    let body = if has_cv || has_job_posting {
        GREETING_WITH_CONTEXT
    } else {
        GREETING_WITHOUT_CONTEXT
    };
    format!("{prefix} {body}")
}
