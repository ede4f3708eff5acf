//! Session state, the published snapshot and change notifications.
//!
//! [`SessionState`] is the Turn Coordinator's single state value.  The
//! runner copies the controller's view into a [`SharedSnapshot`] after every
//! step and emits the differences as [`SessionUpdate`]s.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::interview::SessionMessage;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// States of the voice session.
///
/// ```text
/// Idle ──start──▶ Speaking ──playback done──▶ Listening
///                    ▲                            │ final transcript
///                    │ response                   ▼
///                    └────────────────────── Thinking
///                                                 │ failure
///                                                 └──▶ Listening
/// any ──stop / reset / mute──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Listening,
    Speaking,
    Thinking,
}

impl SessionState {
    /// ```
    /// use interview_voice::session::SessionState;
    ///
    /// assert_eq!(SessionState::Thinking.label(), "Thinking");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Listening => "Listening",
            SessionState::Speaking => "Speaking",
            SessionState::Thinking => "Thinking",
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Everything a front-end renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub messages: Vec<SessionMessage>,
    /// Non-final transcript of the answer in progress.
    pub interim: String,
    pub question_count: u32,
    pub question_goal: u32,
    pub elapsed: Duration,
    pub connected: bool,
    pub muted: bool,
    /// `"default"` or a device id.
    pub selected_mic: String,
    pub recognition_available: bool,
}

/// Cheap to clone.  Lock briefly; never hold the guard across `.await`.
pub type SharedSnapshot = Arc<Mutex<SessionSnapshot>>;

pub fn new_shared_snapshot() -> SharedSnapshot {
    Arc::new(Mutex::new(SessionSnapshot::default()))
}

// ---------------------------------------------------------------------------
// SessionUpdate
// ---------------------------------------------------------------------------

/// Incremental change notifications for a front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    State(SessionState),
    /// The transcript was replaced (start / reset); its new messages follow.
    Cleared,
    Message(SessionMessage),
    Interim(String),
    Progress { count: u32, goal: u32 },
    Connection { connected: bool, muted: bool },
    Microphone(String),
}

impl SessionUpdate {
    /// Changes from `prev` to `next`, in display order.  Elapsed time is not
    /// reported; read it from the snapshot.
    pub fn diff(prev: &SessionSnapshot, next: &SessionSnapshot) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();

        if prev.connected != next.connected || prev.muted != next.muted {
            updates.push(SessionUpdate::Connection {
                connected: next.connected,
                muted: next.muted,
            });
        }
        if prev.selected_mic != next.selected_mic {
            updates.push(SessionUpdate::Microphone(next.selected_mic.clone()));
        }

        let extends = prev.messages.len() <= next.messages.len()
            && prev
                .messages
                .iter()
                .zip(&next.messages)
                .all(|(a, b)| a.id == b.id);
        let fresh = if extends {
            &next.messages[prev.messages.len()..]
        } else {
            updates.push(SessionUpdate::Cleared);
            &next.messages[..]
        };
        updates.extend(fresh.iter().cloned().map(SessionUpdate::Message));

        if prev.interim != next.interim {
            updates.push(SessionUpdate::Interim(next.interim.clone()));
        }
        if prev.question_count != next.question_count || prev.question_goal != next.question_goal {
            updates.push(SessionUpdate::Progress {
                count: next.question_count,
                goal: next.question_goal,
            });
        }
        if prev.state != next.state {
            updates.push(SessionUpdate::State(next.state));
        }
        updates
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
