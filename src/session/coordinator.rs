//! Turn Coordinator: the session state machine as a pure transition function.
//!
//! [`SessionController`] owns the session state, the transcript, the counters
//! and the [`RecognitionDriver`].  Every input (a [`SessionCommand`] or a
//! [`SessionEvent`]) is applied as one indivisible step that mutates the
//! controller and returns the [`Effect`]s to run.  Nothing here blocks,
//! spawns or sleeps, so the whole table is tested by injecting events.
//!
//! Stale completions are dropped by id: recognition attempts, utterances and
//! inference turns are numbered monotonically and never reused, and nothing
//! asynchronous is accepted while the session is disconnected.

use std::time::{Duration, Instant};

use crate::audio::{CaptureError, DEFAULT_DEVICE_ID};
use crate::config::{InterviewSettings, SessionTimings};
use crate::interview::{
    greeting_text, question_goal, InterviewConfig, SessionMessage, Source, Transcript,
};
use crate::llm::{InferenceError, InferenceErrorKind, InterviewRequest};
use crate::speech::{DriverAction, ListenGate, RecognitionDriver};

use super::effect::{AcquirePurpose, Effect};
use super::event::{SessionCommand, SessionEvent, StartOptions};
use super::state::{SessionSnapshot, SessionState};

pub const MIC_ACCESS_ADVISORY: &str =
    "I couldn't access your microphone. Please allow microphone permissions and try again.";

pub const MIC_SWITCH_ADVISORY: &str =
    "I couldn't access the selected microphone. Please check permissions and try again.";

/// Assistant message appended when an interviewer turn fails.
pub fn inference_advisory(error: &InferenceError) -> String {
    format!("I encountered an error: {error}. Please verify your configuration and try again.")
}

// ---------------------------------------------------------------------------
// SessionClock
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
struct SessionClock {
    started_at: Option<Instant>,
    frozen: Duration,
}

impl SessionClock {
    fn start(&mut self) {
        self.started_at = Some(Instant::now());
        self.frozen = Duration::ZERO;
    }

    fn stop(&mut self) {
        if let Some(t) = self.started_at.take() {
            self.frozen = t.elapsed();
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn elapsed(&self) -> Duration {
        self.started_at.map_or(self.frozen, |t| t.elapsed())
    }
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

pub struct SessionController {
    settings: InterviewSettings,
    driver: RecognitionDriver,

    state: SessionState,
    transcript: Transcript,
    connected: bool,
    muted: bool,

    config: InterviewConfig,
    cv_content: String,
    job_posting_content: String,
    has_cv: bool,
    has_job_posting: bool,
    candidate_name: String,
    question_count: u32,
    question_goal: u32,

    /// `"default"` or a device id.
    selected_mic: String,
    /// Set while the start-time microphone acquisition is outstanding.
    pending_start: Option<StartOptions>,
    utterance: u64,
    turn: u64,
    clock: SessionClock,
}

impl SessionController {
    /// `recognition_available == false` runs the session without voice
    /// input; typed answers still work.
    pub fn new(
        settings: InterviewSettings,
        timings: SessionTimings,
        recognition_available: bool,
        selected_mic: Option<String>,
    ) -> Self {
        if !recognition_available {
            log::warn!("session: speech recognition unavailable; voice answers are disabled");
        }
        let config = settings.config.normalized(&settings.limits, &settings.config);
        let question_goal = question_goal(&config, settings.minimum_questions);
        Self {
            driver: RecognitionDriver::new(timings, recognition_available),
            state: SessionState::Idle,
            transcript: Transcript::new(),
            connected: false,
            muted: false,
            config,
            cv_content: settings.cv_content.clone(),
            job_posting_content: settings.job_posting_content.clone(),
            has_cv: false,
            has_job_posting: false,
            candidate_name: String::new(),
            question_count: 0,
            question_goal,
            selected_mic: normalize_device(selected_mic.as_deref().unwrap_or_default()),
            pending_start: None,
            utterance: 0,
            turn: 0,
            clock: SessionClock::default(),
            settings,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn messages(&self) -> &[SessionMessage] {
        self.transcript.messages()
    }

    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    pub fn question_goal(&self) -> u32 {
        self.question_goal
    }

    pub fn config(&self) -> &InterviewConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn selected_microphone(&self) -> &str {
        &self.selected_mic
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn driver(&self) -> &RecognitionDriver {
        &self.driver
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            messages: self.transcript.messages().to_vec(),
            interim: self.driver.interim().to_string(),
            question_count: self.question_count,
            question_goal: self.question_goal,
            elapsed: self.clock.elapsed(),
            connected: self.connected,
            muted: self.muted,
            selected_mic: self.selected_mic.clone(),
            recognition_available: self.driver.is_available(),
        }
    }

    // ── Commands ──────────────────────────────────────────────────────────

    pub fn handle_command(&mut self, command: SessionCommand) -> Vec<Effect> {
        log::debug!("session: command {command:?} in {}", self.state.label());
        match command {
            SessionCommand::Start(options) => self.start(options),
            SessionCommand::Stop => self.stop(),
            SessionCommand::Reset => self.reset(),
            SessionCommand::ToggleMute => self.set_muted(!self.muted),
            SessionCommand::SetMuted(muted) => self.set_muted(muted),
            SessionCommand::SelectMicrophone(id) => self.select_microphone(&id),
            SessionCommand::SubmitText(text) => self.submit_text(&text),
        }
    }

    fn start(&mut self, options: StartOptions) -> Vec<Effect> {
        if self.connected || self.pending_start.is_some() {
            log::warn!("session: start ignored, a session is already running");
            return Vec::new();
        }
        self.pending_start = Some(options);
        vec![Effect::AcquireMicrophone {
            device: self.preferred_device(),
            purpose: AcquirePurpose::Start,
        }]
    }

    fn stop(&mut self) -> Vec<Effect> {
        let was_active = self.connected || self.pending_start.is_some();
        self.connected = false;
        self.pending_start = None;
        self.state = SessionState::Idle;
        self.muted = false;
        self.clock.stop();

        let mut effects = Vec::new();
        let actions = self.driver.abort();
        self.apply_driver(actions, &mut effects);
        effects.push(Effect::CancelSpeech);
        effects.push(Effect::SetMuted(false));
        effects.push(Effect::ReleaseMicrophone);
        if was_active {
            log::info!("session: stopped after {:?}", self.clock.elapsed());
        }
        effects
    }

    fn reset(&mut self) -> Vec<Effect> {
        let effects = self.stop();
        self.transcript.clear();
        self.config = self
            .settings
            .config
            .normalized(&self.settings.limits, &self.settings.config);
        self.cv_content = self.settings.cv_content.clone();
        self.job_posting_content = self.settings.job_posting_content.clone();
        self.has_cv = false;
        self.has_job_posting = false;
        self.candidate_name.clear();
        self.question_count = 0;
        self.question_goal = question_goal(&self.config, self.settings.minimum_questions);
        self.clock.reset();
        self.driver.reset();
        log::info!("session: reset to defaults");
        effects
    }

    fn set_muted(&mut self, muted: bool) -> Vec<Effect> {
        if muted == self.muted {
            return Vec::new();
        }
        self.muted = muted;
        let mut effects = vec![Effect::SetMuted(muted)];

        if muted {
            let actions = self.driver.pause();
            self.apply_driver(actions, &mut effects);
            self.state = SessionState::Idle;
        } else if self.connected {
            if self.state == SessionState::Idle {
                self.state = SessionState::Listening;
            }
            let actions = self.driver.request_start(self.gate());
            self.apply_driver(actions, &mut effects);
        }
        effects
    }

    fn select_microphone(&mut self, id: &str) -> Vec<Effect> {
        self.selected_mic = normalize_device(id);
        log::info!("session: microphone set to {}", self.selected_mic);
        let mut effects = vec![Effect::PersistDevice(self.selected_mic.clone())];
        if self.connected {
            effects.push(Effect::AcquireMicrophone {
                device: self.preferred_device(),
                purpose: AcquirePurpose::Switch,
            });
        }
        effects
    }

    fn submit_text(&mut self, text: &str) -> Vec<Effect> {
        if !self.connected || self.state == SessionState::Thinking {
            log::warn!("session: typed answer ignored in {}", self.state.label());
            return Vec::new();
        }
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut effects = Vec::new();
        let actions = self.driver.pause();
        self.apply_driver(actions, &mut effects);
        self.begin_turn(text, Source::Text, &mut effects);
        effects
    }

    // ── Collaborator events ───────────────────────────────────────────────

    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::MicrophoneReady { purpose } => self.microphone_ready(purpose),
            SessionEvent::MicrophoneFailed {
                purpose,
                device,
                error,
            } => self.microphone_failed(purpose, device, &error),

            SessionEvent::Recognition { attempt, event } => {
                if !self.connected {
                    log::debug!("session: recognition {event:?} after disconnect dropped");
                    return Vec::new();
                }
                let actions = self.driver.on_event(attempt, event, self.gate());
                let mut effects = Vec::new();
                self.apply_driver(actions, &mut effects);
                effects
            }

            SessionEvent::RecognitionStartFailed { attempt, reason } => {
                self.driver.start_failed(attempt, &reason);
                Vec::new()
            }

            SessionEvent::SpeechFinished { utterance } => self.speech_finished(utterance),

            SessionEvent::InferenceCompleted { turn, result } => {
                self.inference_completed(turn, result)
            }

            SessionEvent::TimerFired(key) => {
                if !self.connected {
                    return Vec::new();
                }
                let actions = self.driver.on_timer(key, self.gate());
                let mut effects = Vec::new();
                self.apply_driver(actions, &mut effects);
                effects
            }
        }
    }

    fn microphone_ready(&mut self, purpose: AcquirePurpose) -> Vec<Effect> {
        match purpose {
            AcquirePurpose::Start => match self.pending_start.take() {
                Some(options) => self.begin_session(options),
                None => {
                    log::debug!("session: microphone opened after stop; releasing");
                    vec![Effect::ReleaseMicrophone]
                }
            },
            AcquirePurpose::Switch => {
                if !self.connected {
                    return vec![Effect::ReleaseMicrophone];
                }
                let mut effects = vec![Effect::SetMuted(self.muted)];
                let actions = self.driver.switch_input(self.gate());
                self.apply_driver(actions, &mut effects);
                effects
            }
        }
    }

    fn microphone_failed(
        &mut self,
        purpose: AcquirePurpose,
        device: Option<String>,
        error: &CaptureError,
    ) -> Vec<Effect> {
        let still_wanted = match purpose {
            AcquirePurpose::Start => self.pending_start.is_some(),
            AcquirePurpose::Switch => self.connected,
        };
        if !still_wanted {
            return Vec::new();
        }

        if error.is_recoverable() && device.is_some() {
            log::warn!(
                "session: microphone {} unavailable ({error}); falling back to default",
                device.as_deref().unwrap_or_default()
            );
            self.selected_mic = DEFAULT_DEVICE_ID.to_string();
            return vec![
                Effect::PersistDevice(self.selected_mic.clone()),
                Effect::AcquireMicrophone {
                    device: None,
                    purpose,
                },
            ];
        }

        log::error!("session: microphone unavailable: {error}");
        match purpose {
            AcquirePurpose::Start => {
                self.pending_start = None;
                self.advise(MIC_ACCESS_ADVISORY);
            }
            AcquirePurpose::Switch => self.advise(MIC_SWITCH_ADVISORY),
        }
        Vec::new()
    }

    fn speech_finished(&mut self, utterance: u64) -> Vec<Effect> {
        if !self.connected || utterance != self.utterance || self.state != SessionState::Speaking {
            log::debug!("session: playback {utterance} finished, nothing to resume");
            return Vec::new();
        }
        if self.muted {
            self.state = SessionState::Idle;
            return Vec::new();
        }
        self.state = SessionState::Listening;
        let mut effects = Vec::new();
        let actions = self.driver.request_start(self.gate());
        self.apply_driver(actions, &mut effects);
        effects
    }

    fn inference_completed(
        &mut self,
        turn: u64,
        result: Result<String, InferenceError>,
    ) -> Vec<Effect> {
        if !self.connected || turn != self.turn {
            log::debug!("session: dropping stale response for turn {turn}");
            return Vec::new();
        }

        let mut effects = Vec::new();
        match result {
            Ok(text) => {
                self.transcript.push(SessionMessage::assistant(text.clone()));
                if self.question_count < self.question_goal {
                    self.question_count = (self.question_count + 1).min(self.question_goal);
                }
                log::info!(
                    "session: question {} of {}",
                    self.question_count,
                    self.question_goal
                );
                self.state = SessionState::Speaking;
                self.speak(text, &mut effects);
            }
            Err(e) => {
                match e.kind() {
                    InferenceErrorKind::Credentials => log::error!("session: inference: {e}"),
                    InferenceErrorKind::Network | InferenceErrorKind::Other => {
                        log::warn!("session: inference: {e:?}")
                    }
                }
                self.advise(&inference_advisory(&e));
                self.state = if self.muted {
                    SessionState::Idle
                } else {
                    SessionState::Listening
                };
                let actions = self.driver.request_start(self.gate());
                self.apply_driver(actions, &mut effects);
            }
        }
        effects
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn begin_session(&mut self, options: StartOptions) -> Vec<Effect> {
        if let Some(config) = options.config {
            self.config = config.normalized(&self.settings.limits, &self.settings.config);
        }
        if let Some(cv) = options.cv_content {
            self.cv_content = cv;
        }
        if let Some(job) = options.job_posting_content {
            self.job_posting_content = job;
        }
        if let Some(flag) = options.has_cv {
            self.has_cv = flag;
        }
        if let Some(flag) = options.has_job_posting {
            self.has_job_posting = flag;
        }
        if let Some(name) = options.candidate_name {
            self.candidate_name = name.trim().to_string();
        }

        self.question_goal = question_goal(&self.config, self.settings.minimum_questions);
        self.question_count = 0;
        self.transcript.clear();
        self.driver.reset();
        self.clock.start();
        self.connected = true;
        self.muted = false;

        log::info!(
            "session: started ({} questions planned, {} difficulty)",
            self.question_goal,
            self.config.difficulty.as_str()
        );

        let mut effects = vec![Effect::SetMuted(false)];
        let greeting = greeting_text(self.has_cv, self.has_job_posting, &self.candidate_name);
        self.transcript.push(SessionMessage::assistant(greeting.clone()));
        self.state = SessionState::Speaking;
        self.speak(greeting, &mut effects);
        effects
    }

    /// Record the answer and ask the model for the next turn.
    fn begin_turn(&mut self, text: &str, source: Source, effects: &mut Vec<Effect>) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.transcript.push(SessionMessage::user(text, source));
        self.state = SessionState::Thinking;
        self.turn += 1;

        let request = InterviewRequest {
            transcript: text.to_string(),
            cv_content: non_blank(&self.cv_content),
            job_posting_content: non_blank(&self.job_posting_content),
            config: self.config,
            question_count: self.question_count,
            question_goal: self.question_goal,
            candidate_name: non_blank(&self.candidate_name),
        };
        effects.push(Effect::RequestInference {
            turn: self.turn,
            request,
        });
    }

    fn speak(&mut self, text: String, effects: &mut Vec<Effect>) {
        self.utterance += 1;
        effects.push(Effect::Speak {
            utterance: self.utterance,
            text,
        });
    }

    fn advise(&mut self, text: &str) {
        self.transcript.push(SessionMessage::assistant(text));
    }

    fn apply_driver(&mut self, actions: Vec<DriverAction>, effects: &mut Vec<Effect>) {
        for action in actions {
            match action {
                DriverAction::Final(text) => {
                    if self.gate().may_listen() {
                        self.begin_turn(&text, Source::Voice, effects);
                    } else {
                        log::debug!("session: final transcript outside listening dropped");
                    }
                }
                DriverAction::Advisory(text) => self.advise(text),
                other => effects.extend(Effect::from_driver(&other)),
            }
        }
    }

    fn gate(&self) -> ListenGate {
        ListenGate {
            connected: self.connected,
            listening: self.state == SessionState::Listening,
            muted: self.muted,
        }
    }

    fn preferred_device(&self) -> Option<String> {
        (self.selected_mic != DEFAULT_DEVICE_ID).then(|| self.selected_mic.clone())
    }
}

fn normalize_device(id: &str) -> String {
    let id = id.trim();
    if id.is_empty() {
        DEFAULT_DEVICE_ID.to_string()
    } else {
        id.to_string()
    }
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
