//! Recognition Driver: keeps a single-utterance recognizer listening.
//!
//! The driver is pure bookkeeping.  It consumes recognizer events and timer
//! firings and answers with [`DriverAction`]s for the session to execute.
//!
//! Guarantees:
//! * at most one attempt is live; a start requested while the previous
//!   attempt is still stopping is deferred until its `Ended`;
//! * at most one restart is pending (`restart_pending`), whichever of the
//!   natural-end, no-speech or mic-switch paths armed it;
//! * a final transcript equal to the previous final of the same attempt is
//!   dropped as an echo;
//! * consecutive no-speech errors are retried until the budget is spent,
//!   then reported once and the counter starts over;
//! * a capture failure is reported once and halts automatic restarts until
//!   the next explicit [`RecognitionDriver::request_start`].

use std::time::Duration;

use crate::config::SessionTimings;
use crate::speech::recognition::{RecognitionErrorKind, RecognitionEvent};

pub const NO_SPEECH_ADVISORY: &str = "I'm having trouble detecting your voice. Please check your microphone connection and speak clearly when you're ready.";

pub const NO_MICROPHONE_ADVISORY: &str = "I cannot detect a microphone. Please verify microphone permissions and hardware before continuing.";

/// One-shot timers, one pending per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    SilenceTimeout,
    NoSpeechRetry,
    NoSpeechSettle,
    NaturalRestart,
    MicSwitchSettle,
}

impl TimerKey {
    pub const ALL: [TimerKey; 5] = [
        TimerKey::SilenceTimeout,
        TimerKey::NoSpeechRetry,
        TimerKey::NoSpeechSettle,
        TimerKey::NaturalRestart,
        TimerKey::MicSwitchSettle,
    ];
}

/// Side effects requested by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverAction {
    /// Start the recognizer for attempt `n`.
    Start(u64),
    Stop,
    Abort,
    ArmTimer(TimerKey, Duration),
    CancelTimer(TimerKey),
    /// An accepted final transcript.
    Final(String),
    /// Text to append as an assistant advisory.
    Advisory(&'static str),
}

/// Session conditions the driver needs to decide whether to listen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenGate {
    pub connected: bool,
    /// The session is in the listening state.
    pub listening: bool,
    pub muted: bool,
}

impl ListenGate {
    /// Recognition may run only while connected, listening and unmuted.
    pub fn may_listen(&self) -> bool {
        self.connected && self.listening && !self.muted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

pub struct RecognitionDriver {
    timings: SessionTimings,
    available: bool,
    engine: EngineState,
    next_attempt: u64,
    current: Option<u64>,
    restart_pending: bool,
    start_after_stop: bool,
    halted: bool,
    no_speech_count: u32,
    last_final: String,
    interim: String,
}

impl RecognitionDriver {
    /// `available == false` models a host without a recognizer: every start
    /// request becomes a no-op.
    pub fn new(timings: SessionTimings, available: bool) -> Self {
        Self {
            timings,
            available,
            engine: EngineState::Stopped,
            next_attempt: 0,
            current: None,
            restart_pending: false,
            start_after_stop: false,
            halted: false,
            no_speech_count: 0,
            last_final: String::new(),
            interim: String::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine
    }

    pub fn current_attempt(&self) -> Option<u64> {
        self.current
    }

    pub fn no_speech_count(&self) -> u32 {
        self.no_speech_count
    }

    pub fn is_restart_pending(&self) -> bool {
        self.restart_pending
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Latest non-final transcript of the live attempt.
    pub fn interim(&self) -> &str {
        &self.interim
    }

    /// Forget everything carried between attempts.
    pub fn reset(&mut self) {
        self.restart_pending = false;
        self.start_after_stop = false;
        self.halted = false;
        self.no_speech_count = 0;
        self.last_final.clear();
        self.interim.clear();
    }

    // ── Commands from the session ─────────────────────────────────────────

    /// Explicit start: speech finished, unmute, failed turn.  Clears a halt.
    pub fn request_start(&mut self, gate: ListenGate) -> Vec<DriverAction> {
        self.halted = false;
        self.restart_pending = false;
        self.try_start(gate)
    }

    /// Stop listening and drop any scheduled restart (mute, typed answer).
    pub fn pause(&mut self) -> Vec<DriverAction> {
        self.restart_pending = false;
        self.start_after_stop = false;
        self.interim.clear();
        let mut actions = cancel_all();
        actions.extend(self.stop_engine());
        actions
    }

    /// Drop the live attempt and every timer (session stop).
    pub fn abort(&mut self) -> Vec<DriverAction> {
        let mut actions = cancel_all();
        if self.current.take().is_some() || self.engine != EngineState::Stopped {
            actions.push(DriverAction::Abort);
        }
        self.engine = EngineState::Stopped;
        self.restart_pending = false;
        self.start_after_stop = false;
        self.interim.clear();
        actions
    }

    /// The input device changed: stop, then start again after a settle delay.
    pub fn switch_input(&mut self, gate: ListenGate) -> Vec<DriverAction> {
        if !gate.connected || gate.muted || !self.available {
            return Vec::new();
        }
        self.restart_pending = true;
        self.start_after_stop = false;
        let mut actions = self.stop_engine();
        actions.push(DriverAction::ArmTimer(
            TimerKey::MicSwitchSettle,
            self.timings.mic_switch_settle,
        ));
        actions
    }

    /// The recognizer refused to start `attempt`.
    pub fn start_failed(&mut self, attempt: u64, reason: &str) {
        if self.current != Some(attempt) {
            return;
        }
        log::warn!("recognition: attempt {attempt} failed to start: {reason}");
        self.current = None;
        self.engine = EngineState::Stopped;
        self.restart_pending = false;
    }

    // ── Recognizer events ─────────────────────────────────────────────────

    pub fn on_event(
        &mut self,
        attempt: u64,
        event: RecognitionEvent,
        gate: ListenGate,
    ) -> Vec<DriverAction> {
        if self.current != Some(attempt) {
            log::debug!("recognition: dropping {event:?} from stale attempt {attempt}");
            return Vec::new();
        }

        match event {
            RecognitionEvent::Started => {
                self.engine = EngineState::Running;
                self.last_final.clear();
                self.interim.clear();
                self.restart_pending = false;
                vec![DriverAction::ArmTimer(
                    TimerKey::SilenceTimeout,
                    self.timings.silence_timeout,
                )]
            }

            RecognitionEvent::Ended => {
                self.engine = EngineState::Stopped;
                self.current = None;
                let mut actions = vec![DriverAction::CancelTimer(TimerKey::SilenceTimeout)];
                if std::mem::take(&mut self.start_after_stop) {
                    actions.extend(self.try_start(gate));
                } else if gate.may_listen() && !self.restart_pending && !self.halted {
                    self.restart_pending = true;
                    actions.push(DriverAction::ArmTimer(
                        TimerKey::NaturalRestart,
                        self.timings.natural_restart,
                    ));
                }
                actions
            }

            RecognitionEvent::SpeechEnded => {
                let mut actions = vec![DriverAction::CancelTimer(TimerKey::SilenceTimeout)];
                if !self.interim.trim().is_empty() {
                    self.restart_pending = true;
                    actions.extend(self.stop_engine());
                }
                actions
            }

            RecognitionEvent::Result { text, is_final } => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Vec::new();
                }
                self.no_speech_count = 0;

                if !is_final {
                    self.interim = text;
                    return Vec::new();
                }

                self.interim.clear();
                if trimmed == self.last_final {
                    log::debug!("recognition: dropping repeated final transcript");
                    self.restart_pending = false;
                    return Vec::new();
                }

                self.last_final = trimmed.to_string();
                self.restart_pending = true;
                let mut actions = self.stop_engine();
                actions.push(DriverAction::Final(trimmed.to_string()));
                actions
            }

            RecognitionEvent::Error(RecognitionErrorKind::NoSpeech) => {
                self.no_speech_count += 1;
                log::debug!("recognition: no speech ({})", self.no_speech_count);

                if self.no_speech_count >= self.timings.max_no_speech_retries {
                    self.no_speech_count = 0;
                    vec![DriverAction::Advisory(NO_SPEECH_ADVISORY)]
                } else if gate.connected {
                    self.restart_pending = true;
                    vec![DriverAction::ArmTimer(
                        TimerKey::NoSpeechRetry,
                        self.timings.no_speech_retry,
                    )]
                } else {
                    Vec::new()
                }
            }

            RecognitionEvent::Error(RecognitionErrorKind::AudioCapture) => {
                log::warn!("recognition: audio capture failed; halting restarts");
                self.halted = true;
                self.restart_pending = false;
                self.start_after_stop = false;
                vec![
                    DriverAction::CancelTimer(TimerKey::NoSpeechRetry),
                    DriverAction::CancelTimer(TimerKey::NoSpeechSettle),
                    DriverAction::CancelTimer(TimerKey::NaturalRestart),
                    DriverAction::Advisory(NO_MICROPHONE_ADVISORY),
                ]
            }

            RecognitionEvent::Error(RecognitionErrorKind::Other(message)) => {
                log::warn!("recognition: {message}");
                Vec::new()
            }
        }
    }

    // ── Timers ────────────────────────────────────────────────────────────

    pub fn on_timer(&mut self, key: TimerKey, gate: ListenGate) -> Vec<DriverAction> {
        match key {
            TimerKey::SilenceTimeout => {
                if gate.connected {
                    log::info!("recognition: silence timeout, stopping");
                    self.stop_engine()
                } else {
                    Vec::new()
                }
            }

            TimerKey::NoSpeechRetry => {
                if !gate.connected {
                    self.restart_pending = false;
                    return Vec::new();
                }
                let mut actions = self.stop_engine();
                actions.push(DriverAction::ArmTimer(
                    TimerKey::NoSpeechSettle,
                    self.timings.retry_settle,
                ));
                actions
            }

            TimerKey::NoSpeechSettle | TimerKey::NaturalRestart | TimerKey::MicSwitchSettle => {
                self.restart_pending = false;
                if self.halted {
                    return Vec::new();
                }
                self.try_start(gate)
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn try_start(&mut self, gate: ListenGate) -> Vec<DriverAction> {
        if !self.available || !gate.may_listen() {
            return Vec::new();
        }
        match self.engine {
            EngineState::Stopped => {
                self.next_attempt += 1;
                self.current = Some(self.next_attempt);
                self.engine = EngineState::Starting;
                vec![DriverAction::Start(self.next_attempt)]
            }
            EngineState::Stopping => {
                self.start_after_stop = true;
                Vec::new()
            }
            EngineState::Starting | EngineState::Running => Vec::new(),
        }
    }

    fn stop_engine(&mut self) -> Vec<DriverAction> {
        match self.engine {
            EngineState::Starting | EngineState::Running => {
                self.engine = EngineState::Stopping;
                vec![DriverAction::Stop]
            }
            EngineState::Stopped | EngineState::Stopping => Vec::new(),
        }
    }
}

fn cancel_all() -> Vec<DriverAction> {
    TimerKey::ALL
        .iter()
        .map(|key| DriverAction::CancelTimer(*key))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const LISTENING: ListenGate = ListenGate {
        connected: true,
        listening: true,
        muted: false,
    };

    fn driver() -> RecognitionDriver {
        RecognitionDriver::new(SessionTimings::default(), true)
    }

    /// Start an attempt and deliver `Started`; returns the attempt id.
    fn running(d: &mut RecognitionDriver) -> u64 {
        let actions = d.request_start(LISTENING);
        let Some(DriverAction::Start(id)) = actions.first().cloned() else {
            panic!("expected Start, got {actions:?}");
        };
        d.on_event(id, RecognitionEvent::Started, LISTENING);
        id
    }

    fn final_result(text: &str) -> RecognitionEvent {
        RecognitionEvent::Result {
            text: text.into(),
            is_final: true,
        }
    }

    fn no_speech() -> RecognitionEvent {
        RecognitionEvent::Error(RecognitionErrorKind::NoSpeech)
    }

    #[test]
    fn start_arms_silence_timeout() {
        let mut d = driver();
        let id = d.request_start(LISTENING);
        assert_eq!(id, vec![DriverAction::Start(1)]);
        let actions = d.on_event(1, RecognitionEvent::Started, LISTENING);
        assert_eq!(
            actions,
            vec![DriverAction::ArmTimer(
                TimerKey::SilenceTimeout,
                Duration::from_secs(15)
            )]
        );
        assert_eq!(d.engine_state(), EngineState::Running);
    }

    #[test]
    fn never_two_attempts_at_once() {
        let mut d = driver();
        running(&mut d);
        assert!(d.request_start(LISTENING).is_empty());
    }

    #[test]
    fn start_while_stopping_is_deferred_to_ended() {
        let mut d = driver();
        let id = running(&mut d);
        d.on_timer(TimerKey::SilenceTimeout, LISTENING);
        assert_eq!(d.engine_state(), EngineState::Stopping);

        assert!(d.request_start(LISTENING).is_empty());
        let actions = d.on_event(id, RecognitionEvent::Ended, LISTENING);
        assert!(actions.contains(&DriverAction::Start(id + 1)));
    }

    #[test]
    fn natural_end_schedules_one_restart() {
        let mut d = driver();
        let id = running(&mut d);
        let actions = d.on_event(id, RecognitionEvent::Ended, LISTENING);
        assert!(actions.contains(&DriverAction::ArmTimer(
            TimerKey::NaturalRestart,
            Duration::from_millis(500)
        )));
        assert!(d.is_restart_pending());

        let restarted = d.on_timer(TimerKey::NaturalRestart, LISTENING);
        assert_eq!(restarted, vec![DriverAction::Start(id + 1)]);
        assert!(!d.is_restart_pending());
    }

    #[test]
    fn no_restart_when_not_listening() {
        let mut d = driver();
        let id = running(&mut d);
        let thinking = ListenGate {
            listening: false,
            ..LISTENING
        };
        let actions = d.on_event(id, RecognitionEvent::Ended, thinking);
        assert_eq!(actions, vec![DriverAction::CancelTimer(TimerKey::SilenceTimeout)]);
    }

    #[test]
    fn final_transcript_stops_and_is_forwarded_once() {
        let mut d = driver();
        let id = running(&mut d);
        let actions = d.on_event(id, final_result("  I like Rust "), LISTENING);
        assert_eq!(
            actions,
            vec![DriverAction::Stop, DriverAction::Final("I like Rust".into())]
        );

        // An echo of the same final in this attempt is dropped.
        let echo = d.on_event(id, final_result("I like Rust"), LISTENING);
        assert!(echo.is_empty());
    }

    #[test]
    fn interim_results_are_tracked_and_cleared() {
        let mut d = driver();
        let id = running(&mut d);
        d.on_event(
            id,
            RecognitionEvent::Result {
                text: "I like".into(),
                is_final: false,
            },
            LISTENING,
        );
        assert_eq!(d.interim(), "I like");
        d.on_event(id, final_result("I like Rust"), LISTENING);
        assert_eq!(d.interim(), "");
    }

    #[test]
    fn speech_end_with_interim_stops_promptly() {
        let mut d = driver();
        let id = running(&mut d);
        assert_eq!(
            d.on_event(id, RecognitionEvent::SpeechEnded, LISTENING),
            vec![DriverAction::CancelTimer(TimerKey::SilenceTimeout)]
        );
        d.on_event(
            id,
            RecognitionEvent::Result {
                text: "so".into(),
                is_final: false,
            },
            LISTENING,
        );
        let actions = d.on_event(id, RecognitionEvent::SpeechEnded, LISTENING);
        assert!(actions.contains(&DriverAction::Stop));
    }

    /// Drive one no-speech cycle: error, retry timer, stop/settle, restart.
    fn no_speech_cycle(d: &mut RecognitionDriver, id: u64) -> (Vec<DriverAction>, u64) {
        let actions = d.on_event(id, no_speech(), LISTENING);
        if actions.contains(&DriverAction::Advisory(NO_SPEECH_ADVISORY)) {
            return (actions, id);
        }
        assert!(actions.contains(&DriverAction::ArmTimer(
            TimerKey::NoSpeechRetry,
            Duration::from_secs(1)
        )));
        // The engine ends on its own; the pending retry suppresses a natural restart.
        let ended = d.on_event(id, RecognitionEvent::Ended, LISTENING);
        assert!(!ended
            .iter()
            .any(|a| matches!(a, DriverAction::ArmTimer(TimerKey::NaturalRestart, _))));

        let retry = d.on_timer(TimerKey::NoSpeechRetry, LISTENING);
        assert_eq!(
            retry,
            vec![DriverAction::ArmTimer(
                TimerKey::NoSpeechSettle,
                Duration::from_millis(300)
            )]
        );
        let start = d.on_timer(TimerKey::NoSpeechSettle, LISTENING);
        let Some(DriverAction::Start(next)) = start.first().cloned() else {
            panic!("expected restart, got {start:?}");
        };
        d.on_event(next, RecognitionEvent::Started, LISTENING);
        (actions, next)
    }

    #[test]
    fn no_speech_budget_reports_once_and_resets() {
        let mut d = driver();
        let id = running(&mut d);

        let (_, id) = no_speech_cycle(&mut d, id);
        let (_, id) = no_speech_cycle(&mut d, id);
        assert_eq!(d.no_speech_count(), 2);

        let (third, _) = no_speech_cycle(&mut d, id);
        let advisories = third
            .iter()
            .filter(|a| matches!(a, DriverAction::Advisory(_)))
            .count();
        assert_eq!(advisories, 1);
        assert_eq!(d.no_speech_count(), 0);
    }

    #[test]
    fn successful_result_resets_no_speech_count() {
        let mut d = driver();
        let id = running(&mut d);
        let (_, id) = no_speech_cycle(&mut d, id);
        let (_, id) = no_speech_cycle(&mut d, id);

        d.on_event(
            id,
            RecognitionEvent::Result {
                text: "hello".into(),
                is_final: false,
            },
            LISTENING,
        );
        assert_eq!(d.no_speech_count(), 0);

        let (fourth, _) = no_speech_cycle(&mut d, id);
        assert!(!fourth.contains(&DriverAction::Advisory(NO_SPEECH_ADVISORY)));
    }

    #[test]
    fn capture_failure_reports_and_halts_restarts() {
        let mut d = driver();
        let id = running(&mut d);
        let actions = d.on_event(
            id,
            RecognitionEvent::Error(RecognitionErrorKind::AudioCapture),
            LISTENING,
        );
        assert!(actions.contains(&DriverAction::Advisory(NO_MICROPHONE_ADVISORY)));

        let ended = d.on_event(id, RecognitionEvent::Ended, LISTENING);
        assert_eq!(ended, vec![DriverAction::CancelTimer(TimerKey::SilenceTimeout)]);
        assert!(d.is_halted());

        // An explicit start resumes.
        assert_eq!(d.request_start(LISTENING), vec![DriverAction::Start(id + 1)]);
        assert!(!d.is_halted());
    }

    #[test]
    fn other_errors_are_only_logged() {
        let mut d = driver();
        let id = running(&mut d);
        let actions = d.on_event(
            id,
            RecognitionEvent::Error(RecognitionErrorKind::Other("network".into())),
            LISTENING,
        );
        assert!(actions.is_empty());
    }

    #[test]
    fn stale_attempt_events_are_ignored() {
        let mut d = driver();
        let id = running(&mut d);
        d.abort();
        assert!(d
            .on_event(id, final_result("late answer"), LISTENING)
            .is_empty());
        assert_eq!(d.current_attempt(), None);
    }

    #[test]
    fn pause_cancels_timers_and_stops() {
        let mut d = driver();
        running(&mut d);
        let actions = d.pause();
        for key in TimerKey::ALL {
            assert!(actions.contains(&DriverAction::CancelTimer(key)));
        }
        assert!(actions.contains(&DriverAction::Stop));
    }

    #[test]
    fn switch_input_restarts_after_settle() {
        let mut d = driver();
        let id = running(&mut d);
        let actions = d.switch_input(LISTENING);
        assert_eq!(
            actions,
            vec![
                DriverAction::Stop,
                DriverAction::ArmTimer(TimerKey::MicSwitchSettle, Duration::from_millis(200))
            ]
        );
        // The stop's Ended must not schedule a second restart.
        let ended = d.on_event(id, RecognitionEvent::Ended, LISTENING);
        assert_eq!(ended, vec![DriverAction::CancelTimer(TimerKey::SilenceTimeout)]);
        assert_eq!(
            d.on_timer(TimerKey::MicSwitchSettle, LISTENING),
            vec![DriverAction::Start(id + 1)]
        );
    }

    #[test]
    fn unavailable_recognizer_never_starts() {
        let mut d = RecognitionDriver::new(SessionTimings::default(), false);
        assert!(d.request_start(LISTENING).is_empty());
    }
}
