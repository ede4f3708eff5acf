//! Side effects requested by the [`SessionController`](super::SessionController).
//!
//! The controller never touches a device, a task or a timer.  It returns a
//! list of [`Effect`]s and the runner carries them out, feeding the outcomes
//! back as [`SessionEvent`](super::SessionEvent)s.

use std::time::Duration;

use crate::llm::InterviewRequest;
use crate::speech::{DriverAction, TimerKey};

/// Why the microphone is being (re)acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquirePurpose {
    /// Opening a session.
    Start,
    /// The user picked another device mid-session.
    Switch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open `device` (`None` = system default), releasing any held stream.
    AcquireMicrophone {
        device: Option<String>,
        purpose: AcquirePurpose,
    },
    ReleaseMicrophone,
    /// Enable or disable the held stream without releasing it.
    SetMuted(bool),
    StartRecognition(u64),
    StopRecognition,
    AbortRecognition,
    /// Speak `text`; report `SpeechFinished { utterance }` when done.
    Speak { utterance: u64, text: String },
    CancelSpeech,
    /// Ask the model for the next interviewer turn.
    RequestInference { turn: u64, request: InterviewRequest },
    ArmTimer(TimerKey, Duration),
    CancelTimer(TimerKey),
    /// Remember the selected microphone id across runs.
    PersistDevice(String),
}

impl Effect {
    /// The effect form of a driver action.  `Final` and `Advisory` are
    /// handled by the controller itself and have none.
    pub(crate) fn from_driver(action: &DriverAction) -> Option<Effect> {
        match action {
            DriverAction::Start(attempt) => Some(Effect::StartRecognition(*attempt)),
            DriverAction::Stop => Some(Effect::StopRecognition),
            DriverAction::Abort => Some(Effect::AbortRecognition),
            DriverAction::ArmTimer(key, delay) => Some(Effect::ArmTimer(*key, *delay)),
            DriverAction::CancelTimer(key) => Some(Effect::CancelTimer(*key)),
            DriverAction::Final(_) | DriverAction::Advisory(_) => None,
        }
    }
}
