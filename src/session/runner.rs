//! Session runner: executes controller effects against real collaborators.
//!
//! [`SessionRunner`] owns the [`SessionController`] and every collaborator
//! the effects touch.  It responds to [`SessionRequest`]s received over a
//! `tokio::sync::mpsc` channel and to completions arriving on its internal
//! channels.
//!
//! # Flow
//!
//! ```text
//! SessionRequest::Command ──▶ controller.handle_command ──▶ Vec<Effect>
//!                                                              │
//!   AcquireMicrophone ─▶ CaptureManager (synchronous) ─▶ MicrophoneReady / Failed
//!   StartRecognition  ─▶ SpeechRecognizer ─▶ (attempt, RecognitionEvent)
//!   Speak             ─▶ spawn(synthesizer.speak) ─▶ SpeechFinished
//!   RequestInference  ─▶ spawn(model.ask)         ─▶ InferenceCompleted
//!   ArmTimer          ─▶ TimerSet                 ─▶ TimerFired
//!                                                              │
//!                            controller.handle_event ◀─────────┘
//! ```
//!
//! The capture stream and the recognizer are not `Send`, so the runner
//! future must be driven on a current-thread runtime (`LocalSet` /
//! `spawn_local`).  Inference and playback run as ordinary tokio tasks.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::audio::{CaptureManager, DeviceInfo, Microphone, DEFAULT_DEVICE_ID};
use crate::config::{InterviewSettings, SessionTimings};
use crate::llm::InterviewModel;
use crate::speech::{
    RecognitionError, RecognitionEvent, RecognitionSink, SpeechRecognizer, SpeechSynthesizer,
    TimerKey,
};
use crate::storage::{PreferenceStore, SELECTED_MIC_KEY};

use super::coordinator::SessionController;
use super::effect::Effect;
use super::event::{SessionCommand, SessionEvent};
use super::state::{new_shared_snapshot, SessionSnapshot, SessionUpdate, SharedSnapshot};
use super::timers::TimerSet;

/// How often the published snapshot is refreshed while idle, so the
/// elapsed clock keeps moving.
const SNAPSHOT_TICK: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Requests / handle
// ---------------------------------------------------------------------------

pub enum SessionRequest {
    Command(SessionCommand),
    ListDevices { reply: oneshot::Sender<Vec<DeviceInfo>> },
    Shutdown,
}

#[derive(Debug, Error)]
#[error("session runner has stopped")]
pub struct SessionClosed;

/// Cloneable sender side of a runner.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
}

impl SessionHandle {
    /// A handle plus the receiver to pass to [`SessionRunner::run`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SessionRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.tx
            .send(SessionRequest::Command(command))
            .await
            .map_err(|_| SessionClosed)
    }

    pub async fn devices(&self) -> Result<Vec<DeviceInfo>, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::ListDevices { reply })
            .await
            .map_err(|_| SessionClosed)?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(SessionRequest::Shutdown).await;
    }
}

// ---------------------------------------------------------------------------
// SessionParts
// ---------------------------------------------------------------------------

/// Everything a runner is built from.
pub struct SessionParts {
    pub settings: InterviewSettings,
    pub timings: SessionTimings,
    pub speech_rate: f32,
    pub microphone: Box<dyn Microphone>,
    /// `None` runs the session without voice input.
    pub recognizer: Option<Box<dyn SpeechRecognizer>>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub model: Arc<dyn InterviewModel>,
    pub preferences: Box<dyn PreferenceStore>,
}

// ---------------------------------------------------------------------------
// SessionRunner
// ---------------------------------------------------------------------------

/// Drives one [`SessionController`] until shutdown.
///
/// ```rust,no_run
/// use interview_voice::session::{SessionHandle, SessionParts, SessionRunner};
///
/// # async fn example(parts: SessionParts) {
/// let runner = SessionRunner::new(parts);
/// let snapshot = runner.snapshot();
/// let (handle, requests) = SessionHandle::channel(32);
///
/// let local = tokio::task::LocalSet::new();
/// local.spawn_local(runner.run(requests));
/// # let _ = (snapshot, handle);
/// # }
/// ```
pub struct SessionRunner {
    controller: SessionController,
    capture: CaptureManager,
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    model: Arc<dyn InterviewModel>,
    preferences: Box<dyn PreferenceStore>,
    speech_rate: f32,

    timers: TimerSet<TimerKey>,
    timer_rx: mpsc::UnboundedReceiver<(TimerKey, u64)>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    recognition_tx: mpsc::UnboundedSender<(u64, RecognitionEvent)>,
    recognition_rx: mpsc::UnboundedReceiver<(u64, RecognitionEvent)>,
    speech_task: Option<JoinHandle<()>>,

    snapshot: SharedSnapshot,
    published: SessionSnapshot,
    subscribers: Vec<mpsc::UnboundedSender<SessionUpdate>>,
}

impl SessionRunner {
    /// Build a runner.  The stored microphone preference is read here.
    pub fn new(parts: SessionParts) -> Self {
        let selected_mic = parts.preferences.get(SELECTED_MIC_KEY);
        if let Some(id) = &selected_mic {
            log::info!("session: stored microphone preference {id}");
        }
        let controller = SessionController::new(
            parts.settings,
            parts.timings,
            parts.recognizer.is_some(),
            selected_mic,
        );

        let (timers, timer_rx) = TimerSet::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (recognition_tx, recognition_rx) = mpsc::unbounded_channel();

        let snapshot = new_shared_snapshot();
        let published = controller.snapshot();
        set_snapshot(&snapshot, published.clone());

        Self {
            controller,
            capture: CaptureManager::new(parts.microphone),
            recognizer: parts.recognizer,
            synthesizer: parts.synthesizer,
            model: parts.model,
            preferences: parts.preferences,
            speech_rate: parts.speech_rate,
            timers,
            timer_rx,
            events_tx,
            events_rx,
            recognition_tx,
            recognition_rx,
            speech_task: None,
            snapshot,
            published,
            subscribers: Vec::new(),
        }
    }

    /// Shared view of the session; refreshed after every input.
    pub fn snapshot(&self) -> SharedSnapshot {
        Arc::clone(&self.snapshot)
    }

    /// Stream of changes published from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `requests` is closed or a `Shutdown` arrives.  The session
    /// is stopped and the microphone released before returning.
    pub async fn run(mut self, mut requests: mpsc::Receiver<SessionRequest>) {
        log::info!("session: runner started");
        let mut tick = tokio::time::interval(SNAPSHOT_TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(SessionRequest::Command(command)) => {
                        let effects = self.controller.handle_command(command);
                        self.execute(effects);
                    }
                    Some(SessionRequest::ListDevices { reply }) => {
                        let _ = reply.send(self.capture.devices());
                    }
                    Some(SessionRequest::Shutdown) | None => break,
                },
                Some(event) = self.events_rx.recv() => self.dispatch(event),
                Some((attempt, event)) = self.recognition_rx.recv() => {
                    self.dispatch(SessionEvent::Recognition { attempt, event });
                }
                Some((key, seq)) = self.timer_rx.recv() => {
                    if self.timers.take_fired(key, seq) {
                        self.dispatch(SessionEvent::TimerFired(key));
                    }
                }
                _ = tick.tick() => {}
            }
            self.publish();
        }

        let effects = self.controller.handle_command(SessionCommand::Stop);
        self.execute(effects);
        self.timers.cancel_all();
        self.publish();
        log::info!("session: runner shutting down");
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, event: SessionEvent) {
        let effects = self.controller.handle_event(event);
        self.execute(effects);
    }

    /// Run effects in order; synchronous outcomes are fed straight back.
    fn execute(&mut self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            if let Some(event) = self.apply(effect) {
                queue.extend(self.controller.handle_event(event));
            }
        }
    }

    fn apply(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::AcquireMicrophone { device, purpose } => {
                match self.capture.acquire(device.as_deref()) {
                    Ok(_) => Some(SessionEvent::MicrophoneReady { purpose }),
                    Err(error) => {
                        log::warn!(
                            "capture: cannot open {}: {error}",
                            device.as_deref().unwrap_or(DEFAULT_DEVICE_ID)
                        );
                        Some(SessionEvent::MicrophoneFailed {
                            purpose,
                            device,
                            error,
                        })
                    }
                }
            }

            Effect::ReleaseMicrophone => {
                self.capture.release();
                None
            }

            Effect::SetMuted(muted) => {
                self.capture.set_muted(muted);
                None
            }

            Effect::StartRecognition(attempt) => {
                let sink = RecognitionSink::new(attempt, self.recognition_tx.clone());
                let started = match self.recognizer.as_mut() {
                    Some(recognizer) => recognizer.start(sink),
                    None => Err(RecognitionError::Unavailable("no recognizer".into())),
                };
                started
                    .err()
                    .map(|e| SessionEvent::RecognitionStartFailed {
                        attempt,
                        reason: e.to_string(),
                    })
            }

            Effect::StopRecognition => {
                if let Some(recognizer) = self.recognizer.as_mut() {
                    recognizer.stop();
                }
                None
            }

            Effect::AbortRecognition => {
                if let Some(recognizer) = self.recognizer.as_mut() {
                    recognizer.abort();
                }
                None
            }

            Effect::Speak { utterance, text } => {
                if let Some(task) = self.speech_task.take() {
                    if !task.is_finished() {
                        self.synthesizer.cancel();
                    }
                    task.abort();
                }
                let synthesizer = Arc::clone(&self.synthesizer);
                let tx = self.events_tx.clone();
                let rate = self.speech_rate;
                self.speech_task = Some(tokio::spawn(async move {
                    if let Err(e) = synthesizer.speak(&text, rate).await {
                        log::debug!("speech: {e}");
                    }
                    let _ = tx.send(SessionEvent::SpeechFinished { utterance });
                }));
                None
            }

            Effect::CancelSpeech => {
                self.synthesizer.cancel();
                if let Some(task) = self.speech_task.take() {
                    task.abort();
                }
                None
            }

            Effect::RequestInference { turn, request } => {
                let model = Arc::clone(&self.model);
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = model.ask(&request).await;
                    let _ = tx.send(SessionEvent::InferenceCompleted { turn, result });
                });
                None
            }

            Effect::ArmTimer(key, delay) => {
                self.timers.arm(key, delay);
                None
            }

            Effect::CancelTimer(key) => {
                self.timers.cancel(key);
                None
            }

            Effect::PersistDevice(id) => {
                if let Err(e) = self.preferences.set(SELECTED_MIC_KEY, &id) {
                    log::warn!("session: failed to persist microphone choice: {e}");
                }
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Publishing
    // -----------------------------------------------------------------------

    fn publish(&mut self) {
        let next = self.controller.snapshot();
        let updates = SessionUpdate::diff(&self.published, &next);
        if !updates.is_empty() {
            self.subscribers
                .retain(|tx| updates.iter().all(|u| tx.send(u.clone()).is_ok()));
        }
        set_snapshot(&self.snapshot, next.clone());
        self.published = next;
    }
}

fn set_snapshot(shared: &SharedSnapshot, value: SessionSnapshot) {
    match shared.lock() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::task::LocalSet;

    use super::*;
    use crate::audio::capture::fake::{FakeMicLog, FakeMicrophone};
    use crate::interview::Role;
    use crate::llm::{CodeReview, CodeReviewRequest, InferenceError, InterviewRequest};
    use crate::session::{SessionState, StartOptions, MIC_SWITCH_ADVISORY};
    use crate::speech::recognition::fake::{FakeRecognizer, FakeRecognizerLog};
    use crate::speech::{NullSynthesizer, SynthesisError};
    use crate::storage::{JsonFileStore, MemoryStore};

    /// Replies from a script; the last reply repeats.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, InferenceError>>>,
        requests: Mutex<Vec<InterviewRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, InferenceError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl InterviewModel for ScriptedModel {
        async fn ask(&self, request: &InterviewRequest) -> Result<String, InferenceError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut replies = self.replies.lock().unwrap();
            match replies.pop_front() {
                Some(reply) => reply,
                None => Ok("Next question?".into()),
            }
        }

        async fn review_code(
            &self,
            _request: &CodeReviewRequest,
        ) -> Result<CodeReview, InferenceError> {
            Ok(CodeReview::parse("Score: 80/100"))
        }
    }

    struct Rig {
        runner: SessionRunner,
        mic: Arc<Mutex<FakeMicLog>>,
        recognizer: Arc<Mutex<FakeRecognizerLog>>,
    }

    /// Playback that only ends when cancelled.
    #[derive(Default)]
    struct HeldSynthesizer {
        spoken: Mutex<Vec<String>>,
        cancels: Mutex<usize>,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl SpeechSynthesizer for HeldSynthesizer {
        async fn speak(&self, text: &str, _rate: f32) -> Result<(), SynthesisError> {
            self.spoken.lock().unwrap().push(text.to_string());
            self.release.notified().await;
            Err(SynthesisError::Cancelled)
        }

        fn cancel(&self) {
            *self.cancels.lock().unwrap() += 1;
            self.release.notify_waiters();
        }
    }

    fn rig(
        model: Arc<ScriptedModel>,
        preferences: Box<dyn PreferenceStore>,
        missing: &[&str],
    ) -> Rig {
        rig_with_synthesizer(model, preferences, missing, Arc::new(NullSynthesizer))
    }

    fn rig_with_synthesizer(
        model: Arc<ScriptedModel>,
        preferences: Box<dyn PreferenceStore>,
        missing: &[&str],
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Rig {
        let (mut microphone, mic) = FakeMicrophone::new();
        microphone.missing = missing.iter().map(|s| s.to_string()).collect();
        let (recognizer, recognizer_log) = FakeRecognizer::new();
        let runner = SessionRunner::new(SessionParts {
            settings: InterviewSettings::default(),
            timings: SessionTimings::default(),
            speech_rate: 1.0,
            microphone: Box::new(microphone),
            recognizer: Some(Box::new(recognizer)),
            synthesizer,
            model,
            preferences,
        });
        Rig {
            runner,
            mic,
            recognizer: recognizer_log,
        }
    }

    async fn wait_for(snapshot: &SharedSnapshot, what: &str, pred: impl Fn(&SessionSnapshot) -> bool) {
        for _ in 0..300 {
            if pred(&snapshot.lock().unwrap()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {what}: {:?}", snapshot.lock().unwrap());
    }

    fn emit(log: &Arc<Mutex<FakeRecognizerLog>>, event: RecognitionEvent) {
        let guard = log.lock().unwrap();
        let sink = guard.sink.as_ref().expect("recognizer was never started");
        sink.emit(event);
    }

    #[tokio::test]
    async fn voice_turn_end_to_end() {
        LocalSet::new()
            .run_until(async {
                let model = ScriptedModel::new(vec![Ok("What is a lifetime?".into())]);
                let rig = rig(Arc::clone(&model), Box::new(MemoryStore::new()), &[]);
                let snapshot = rig.runner.snapshot();
                let (handle, requests) = SessionHandle::channel(16);
                tokio::task::spawn_local(rig.runner.run(requests));

                handle
                    .send(SessionCommand::Start(StartOptions::default()))
                    .await
                    .unwrap();
                wait_for(&snapshot, "listening", |s| s.state == SessionState::Listening).await;
                assert_eq!(rig.recognizer.lock().unwrap().starts, vec![1]);
                assert_eq!(rig.mic.lock().unwrap().live_streams, 1);

                emit(
                    &rig.recognizer,
                    RecognitionEvent::Result {
                        text: "I like Rust".into(),
                        is_final: true,
                    },
                );
                wait_for(&snapshot, "next question", |s| {
                    s.question_count == 1 && s.state == SessionState::Listening
                })
                .await;

                let snap = snapshot.lock().unwrap().clone();
                let roles: Vec<Role> = snap.messages.iter().map(|m| m.role).collect();
                assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
                assert_eq!(snap.messages[2].content, "What is a lifetime?");
                assert_eq!(model.requests.lock().unwrap()[0].transcript, "I like Rust");
                assert_eq!(rig.recognizer.lock().unwrap().starts, vec![1, 2]);

                handle.shutdown().await;
            })
            .await;
    }

    #[tokio::test]
    async fn inference_failure_returns_to_listening() {
        LocalSet::new()
            .run_until(async {
                let model = ScriptedModel::new(vec![Err(InferenceError::Network("refused".into()))]);
                let rig = rig(model, Box::new(MemoryStore::new()), &[]);
                let snapshot = rig.runner.snapshot();
                let (handle, requests) = SessionHandle::channel(16);
                tokio::task::spawn_local(rig.runner.run(requests));

                handle
                    .send(SessionCommand::Start(StartOptions::default()))
                    .await
                    .unwrap();
                wait_for(&snapshot, "listening", |s| s.state == SessionState::Listening).await;
                handle
                    .send(SessionCommand::SubmitText("typed answer".into()))
                    .await
                    .unwrap();
                wait_for(&snapshot, "advisory", |s| s.messages.len() == 3).await;
                wait_for(&snapshot, "listening again", |s| {
                    s.state == SessionState::Listening
                })
                .await;

                let snap = snapshot.lock().unwrap().clone();
                assert!(snap.messages[2].content.contains("internet connection"));
                assert_eq!(snap.question_count, 0);
                handle.shutdown().await;
            })
            .await;
    }

    #[tokio::test]
    async fn stop_releases_microphone_and_aborts_recognition() {
        LocalSet::new()
            .run_until(async {
                let rig = rig(ScriptedModel::new(vec![]), Box::new(MemoryStore::new()), &[]);
                let snapshot = rig.runner.snapshot();
                let (handle, requests) = SessionHandle::channel(16);
                let runner = tokio::task::spawn_local(rig.runner.run(requests));

                handle
                    .send(SessionCommand::Start(StartOptions::default()))
                    .await
                    .unwrap();
                wait_for(&snapshot, "listening", |s| s.state == SessionState::Listening).await;

                handle.send(SessionCommand::Stop).await.unwrap();
                wait_for(&snapshot, "disconnect", |s| !s.connected).await;
                assert_eq!(rig.mic.lock().unwrap().live_streams, 0);
                assert_eq!(rig.recognizer.lock().unwrap().aborts, 1);
                assert_eq!(snapshot.lock().unwrap().state, SessionState::Idle);

                handle.shutdown().await;
                runner.await.unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn new_utterance_cancels_playback_in_progress() {
        LocalSet::new()
            .run_until(async {
                let synthesizer = Arc::new(HeldSynthesizer::default());
                let rig = rig_with_synthesizer(
                    ScriptedModel::new(vec![Ok("Describe a tradeoff.".into())]),
                    Box::new(MemoryStore::new()),
                    &[],
                    Arc::clone(&synthesizer) as Arc<dyn SpeechSynthesizer>,
                );
                let snapshot = rig.runner.snapshot();
                let (handle, requests) = SessionHandle::channel(16);
                tokio::task::spawn_local(rig.runner.run(requests));

                handle
                    .send(SessionCommand::Start(StartOptions::default()))
                    .await
                    .unwrap();
                wait_for(&snapshot, "greeting", |s| s.state == SessionState::Speaking).await;
                for _ in 0..300 {
                    if !synthesizer.spoken.lock().unwrap().is_empty() {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }

                handle
                    .send(SessionCommand::SubmitText("typed while greeting".into()))
                    .await
                    .unwrap();
                wait_for(&snapshot, "question", |s| {
                    s.messages.len() == 3 && s.state == SessionState::Speaking
                })
                .await;
                for _ in 0..300 {
                    if synthesizer.spoken.lock().unwrap().len() == 2 {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }

                let spoken = synthesizer.spoken.lock().unwrap().clone();
                assert_eq!(spoken.len(), 2);
                assert_eq!(spoken[1], "Describe a tradeoff.");
                assert_eq!(*synthesizer.cancels.lock().unwrap(), 1);

                handle.shutdown().await;
            })
            .await;
    }

    #[tokio::test]
    async fn failed_switch_keeps_listening_on_previous_microphone() {
        LocalSet::new()
            .run_until(async {
                let rig = rig(ScriptedModel::new(vec![]), Box::new(MemoryStore::new()), &[]);
                let snapshot = rig.runner.snapshot();
                let (handle, requests) = SessionHandle::channel(16);
                tokio::task::spawn_local(rig.runner.run(requests));

                handle
                    .send(SessionCommand::Start(StartOptions::default()))
                    .await
                    .unwrap();
                wait_for(&snapshot, "listening", |s| s.state == SessionState::Listening).await;

                rig.mic.lock().unwrap().denied = true;
                handle
                    .send(SessionCommand::SelectMicrophone("USB".into()))
                    .await
                    .unwrap();
                wait_for(&snapshot, "switch advisory", |s| s.messages.len() == 2).await;

                let snap = snapshot.lock().unwrap().clone();
                assert_eq!(snap.messages[1].content, MIC_SWITCH_ADVISORY);
                assert_eq!(snap.state, SessionState::Listening);
                assert!(snap.connected);
                let mic = rig.mic.lock().unwrap();
                assert_eq!(mic.opened, vec![None]);
                assert_eq!(mic.live_streams, 1);
                drop(mic);
                assert_eq!(rig.recognizer.lock().unwrap().aborts, 0);

                handle.shutdown().await;
            })
            .await;
    }

    #[tokio::test]
    async fn missing_device_falls_back_and_persists_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        {
            let mut store = JsonFileStore::open(&path);
            store.set(SELECTED_MIC_KEY, "Ghost Mic").unwrap();
        }

        LocalSet::new()
            .run_until(async {
                let rig = rig(
                    ScriptedModel::new(vec![]),
                    Box::new(JsonFileStore::open(&path)),
                    &["Ghost Mic"],
                );
                let snapshot = rig.runner.snapshot();
                assert_eq!(snapshot.lock().unwrap().selected_mic, "Ghost Mic");
                let (handle, requests) = SessionHandle::channel(16);
                let runner = tokio::task::spawn_local(rig.runner.run(requests));

                handle
                    .send(SessionCommand::Start(StartOptions::default()))
                    .await
                    .unwrap();
                wait_for(&snapshot, "connected", |s| s.connected).await;
                assert_eq!(rig.mic.lock().unwrap().opened, vec![None]);
                assert_eq!(snapshot.lock().unwrap().selected_mic, "default");

                handle.shutdown().await;
                runner.await.unwrap();
            })
            .await;

        let store = JsonFileStore::open(&path);
        assert_eq!(store.get(SELECTED_MIC_KEY).as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn devices_are_listed_and_updates_streamed() {
        LocalSet::new()
            .run_until(async {
                let mut rig = rig(ScriptedModel::new(vec![]), Box::new(MemoryStore::new()), &[]);
                let mut updates = rig.runner.subscribe();
                let (handle, requests) = SessionHandle::channel(16);
                tokio::task::spawn_local(rig.runner.run(requests));

                let devices = handle.devices().await.unwrap();
                assert!(!devices.is_empty());

                handle
                    .send(SessionCommand::SelectMicrophone("Built-in".into()))
                    .await
                    .unwrap();
                let update = tokio::time::timeout(Duration::from_secs(2), updates.recv())
                    .await
                    .unwrap();
                assert_eq!(update, Some(SessionUpdate::Microphone("Built-in".into())));

                handle.shutdown().await;
            })
            .await;
    }

    #[tokio::test]
    async fn handle_reports_closed_runner() {
        let (handle, requests) = SessionHandle::channel(1);
        drop(requests);
        assert!(handle.send(SessionCommand::Stop).await.is_err());
        assert!(handle.devices().await.is_err());
    }
}
