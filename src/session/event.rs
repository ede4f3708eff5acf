//! Inputs to the [`SessionController`](super::SessionController): user
//! commands and collaborator completions.

use crate::audio::CaptureError;
use crate::config::InterviewSettings;
use crate::interview::InterviewConfig;
use crate::llm::InferenceError;
use crate::speech::{RecognitionEvent, TimerKey};

use super::effect::AcquirePurpose;

// ---------------------------------------------------------------------------
// StartOptions
// ---------------------------------------------------------------------------

/// Optional overrides applied when a session starts.  `None` keeps the
/// controller's current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartOptions {
    pub config: Option<InterviewConfig>,
    pub cv_content: Option<String>,
    pub job_posting_content: Option<String>,
    pub has_cv: Option<bool>,
    pub has_job_posting: Option<bool>,
    pub candidate_name: Option<String>,
}

impl StartOptions {
    /// Options from a setup form.
    ///
    /// Inputs are trimmed.  Blank CV / job text falls back to the defaults in
    /// `settings`, and the `has_*` flags record whether the user actually
    /// provided each document.
    ///
    /// ```
    /// use interview_voice::config::InterviewSettings;
    /// use interview_voice::interview::InterviewConfig;
    /// use interview_voice::session::StartOptions;
    ///
    /// let settings = InterviewSettings::default();
    /// let opts = StartOptions::from_setup(InterviewConfig::default(), "  ", "Rust role", " Ana ", &settings);
    /// assert_eq!(opts.has_cv, Some(false));
    /// assert_eq!(opts.has_job_posting, Some(true));
    /// assert_eq!(opts.candidate_name.as_deref(), Some("Ana"));
    /// ```
    pub fn from_setup(
        config: InterviewConfig,
        cv: &str,
        job_posting: &str,
        candidate_name: &str,
        settings: &InterviewSettings,
    ) -> Self {
        let cv = cv.trim();
        let job_posting = job_posting.trim();
        let pick = |text: &str, fallback: &str| {
            if text.is_empty() {
                fallback.to_string()
            } else {
                text.to_string()
            }
        };

        Self {
            config: Some(config.normalized(&settings.limits, &settings.config)),
            cv_content: Some(pick(cv, &settings.cv_content)),
            job_posting_content: Some(pick(job_posting, &settings.job_posting_content)),
            has_cv: Some(!cv.is_empty()),
            has_job_posting: Some(!job_posting.is_empty()),
            candidate_name: Some(candidate_name.trim().to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

/// User intent.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Start(StartOptions),
    /// End the session; the transcript is kept.
    Stop,
    /// Stop and restore every default.
    Reset,
    ToggleMute,
    SetMuted(bool),
    /// Device id, or `"default"`.
    SelectMicrophone(String),
    /// A typed answer.
    SubmitText(String),
}

// ---------------------------------------------------------------------------
// SessionEvent
// ---------------------------------------------------------------------------

/// Collaborator completions, each tagged with the id it was issued under.
#[derive(Debug)]
pub enum SessionEvent {
    MicrophoneReady {
        purpose: AcquirePurpose,
    },
    MicrophoneFailed {
        purpose: AcquirePurpose,
        /// The device that was requested; `None` for the system default.
        device: Option<String>,
        error: CaptureError,
    },
    Recognition {
        attempt: u64,
        event: RecognitionEvent,
    },
    RecognitionStartFailed {
        attempt: u64,
        reason: String,
    },
    /// Playback of `utterance` ended, successfully or not.
    SpeechFinished {
        utterance: u64,
    },
    InferenceCompleted {
        turn: u64,
        result: Result<String, InferenceError>,
    },
    TimerFired(TimerKey),
}
