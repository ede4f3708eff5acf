//! Speech input and output.
//!
//! * [`RecognitionDriver`] keeps a single-utterance recognizer listening:
//!   restarts, silence timeout, echo suppression, no-speech budget.
//! * [`SpeechRecognizer`] is the engine seam; [`WhisperRecognizer`] is the
//!   offline implementation on top of [`crate::stt`].
//! * [`SpeechSynthesizer`] speaks interviewer turns; [`NullSynthesizer`] is
//!   used when the host has no speech output.
//!
//! ```text
//! AudioFeed ─▶ WhisperRecognizer ─(attempt, RecognitionEvent)─▶ RecognitionDriver
//!                     ▲                                               │
//!                     └──────────── DriverAction::Start / Stop ◀──────┘
//! ```

pub mod driver;
pub mod recognition;
pub mod synthesis;
pub mod whisper;

pub use driver::{
    DriverAction, EngineState, ListenGate, RecognitionDriver, TimerKey, NO_MICROPHONE_ADVISORY,
    NO_SPEECH_ADVISORY,
};
pub use recognition::{
    RecognitionError, RecognitionErrorKind, RecognitionEvent, RecognitionSink, SpeechRecognizer,
};
pub use synthesis::{CommandSynthesizer, NullSynthesizer, SpeechSynthesizer, SynthesisError};
pub use whisper::{RecognizerSettings, WhisperRecognizer};
