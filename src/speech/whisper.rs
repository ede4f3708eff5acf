//! Whisper-backed [`SpeechRecognizer`].
//!
//! Each attempt runs on its own worker thread:
//!
//! ```text
//! AudioFeed ──drain──▶ 30 ms frames ──VAD──▶ utterance
//!     │                                        │ trailing silence / stop
//!     └─ lost flag ─▶ Error(AudioCapture)      ▼
//!                                     SttEngine::transcribe ─▶ Result{final}
//! ```
//!
//! No voice within the no-speech window ends the attempt with
//! `Error(NoSpeech)`.  Whisper is not incremental, so no interim results
//! are produced.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::{SharedFeed, VadDetector, FRAME_SAMPLES, TARGET_RATE};
use crate::config::VoiceConfig;
use crate::speech::recognition::{
    RecognitionError, RecognitionErrorKind, RecognitionEvent, RecognitionSink, SpeechRecognizer,
};
use crate::stt::{SttEngine, SttError, MAX_UTTERANCE_SAMPLES};

const RUN: u8 = 0;
const STOP: u8 = 1;
const ABORT: u8 = 2;

const FRAME_DURATION: Duration =
    Duration::from_millis((FRAME_SAMPLES as u64 * 1_000) / TARGET_RATE as u64);

/// Endpointing parameters.
#[derive(Debug, Clone, Copy)]
pub struct RecognizerSettings {
    /// Trailing silence that ends an utterance.
    pub end_of_utterance: Duration,
    /// How long to wait for any voice before reporting no speech.
    pub no_speech_window: Duration,
    pub vad_threshold: f32,
    pub poll_interval: Duration,
}

impl RecognizerSettings {
    pub fn from_voice(voice: &VoiceConfig) -> Self {
        Self {
            end_of_utterance: Duration::from_millis(voice.end_of_utterance_ms),
            no_speech_window: Duration::from_millis(voice.no_speech_window_ms),
            vad_threshold: voice.vad_threshold,
            poll_interval: Duration::from_millis(30),
        }
    }
}

struct Worker {
    control: Arc<AtomicU8>,
    live: Arc<AtomicBool>,
    /// Set while the worker is still draining the feed.
    capturing: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct WhisperRecognizer {
    engine: Arc<dyn SttEngine>,
    feed: SharedFeed,
    settings: RecognizerSettings,
    worker: Option<Worker>,
    /// Aborted or finished workers not yet joined.
    retired: Vec<Worker>,
}

impl WhisperRecognizer {
    pub fn new(engine: Arc<dyn SttEngine>, feed: SharedFeed, settings: RecognizerSettings) -> Self {
        Self {
            engine,
            feed,
            settings,
            worker: None,
            retired: Vec::new(),
        }
    }

    /// Wait for retired workers to stop draining the feed, then join the
    /// ones that have exited.  A worker still transcribing no longer reads
    /// the feed and is left to finish on its own.
    fn reap(&mut self) {
        let limit = self.settings.poll_interval * 20;
        for worker in &self.retired {
            let waited = Instant::now();
            while worker.capturing.load(Ordering::SeqCst) {
                if waited.elapsed() >= limit {
                    log::warn!("recognition: previous attempt still capturing after {limit:?}");
                    break;
                }
                std::thread::sleep(self.settings.poll_interval / 2);
            }
        }

        let (finished, running): (Vec<_>, Vec<_>) = self
            .retired
            .drain(..)
            .partition(|worker| worker.handle.is_finished());
        self.retired = running;
        for worker in finished {
            if worker.handle.join().is_err() {
                log::error!("recognition: worker thread panicked");
            }
        }
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn start(&mut self, sink: RecognitionSink) -> Result<(), RecognitionError> {
        if let Some(worker) = &self.worker {
            if worker.live.load(Ordering::SeqCst) {
                return Err(RecognitionError::AlreadyRunning);
            }
        }
        if let Some(previous) = self.worker.take() {
            self.retired.push(previous);
        }
        self.reap();

        let control = Arc::new(AtomicU8::new(RUN));
        let live = Arc::new(AtomicBool::new(true));
        let capturing = Arc::new(AtomicBool::new(true));

        let attempt = Attempt {
            engine: Arc::clone(&self.engine),
            feed: Arc::clone(&self.feed),
            settings: self.settings,
            control: Arc::clone(&control),
            live: Arc::clone(&live),
            capturing: Arc::clone(&capturing),
            sink,
        };

        let handle = std::thread::Builder::new()
            .name("recognition".into())
            .spawn(move || attempt.run())
            .map_err(|e| RecognitionError::Unavailable(e.to_string()))?;

        self.worker = Some(Worker {
            control,
            live,
            capturing,
            handle,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = &self.worker {
            let _ = worker
                .control
                .compare_exchange(RUN, STOP, Ordering::SeqCst, Ordering::SeqCst);
        }
    }

    /// The aborted worker goes quiet and is reaped by the next `start`.
    fn abort(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.control.store(ABORT, Ordering::SeqCst);
            self.retired.push(worker);
        }
    }
}

impl Drop for WhisperRecognizer {
    fn drop(&mut self) {
        self.abort();
    }
}

// ---------------------------------------------------------------------------
// Attempt (worker thread body)
// ---------------------------------------------------------------------------

struct Attempt {
    engine: Arc<dyn SttEngine>,
    feed: SharedFeed,
    settings: RecognizerSettings,
    control: Arc<AtomicU8>,
    live: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
    sink: RecognitionSink,
}

enum Capture {
    Utterance(Vec<f32>),
    Nothing,
    NoSpeech,
    Lost,
    Aborted,
}

impl Attempt {
    fn aborted(&self) -> bool {
        self.control.load(Ordering::SeqCst) == ABORT
    }

    fn emit(&self, event: RecognitionEvent) {
        if !self.aborted() {
            self.sink.emit(event);
        }
    }

    fn run(self) {
        // Audio captured before this attempt (e.g. our own speech) is stale.
        self.feed.clear();
        self.emit(RecognitionEvent::Started);
        log::debug!("recognition: attempt {} listening", self.sink.attempt());

        let captured = self.capture();
        self.capturing.store(false, Ordering::SeqCst);

        match captured {
            Capture::Utterance(audio) => self.transcribe(&audio),
            Capture::Nothing => {}
            Capture::NoSpeech => {
                self.emit(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech));
            }
            Capture::Lost => {
                self.emit(RecognitionEvent::Error(RecognitionErrorKind::AudioCapture));
            }
            Capture::Aborted => {
                self.live.store(false, Ordering::SeqCst);
                return;
            }
        }

        self.live.store(false, Ordering::SeqCst);
        self.emit(RecognitionEvent::Ended);
    }

    fn capture(&self) -> Capture {
        let vad = VadDetector::new(self.settings.vad_threshold);
        let started = Instant::now();
        let mut pending: Vec<f32> = Vec::new();
        let mut utterance: Vec<f32> = Vec::new();
        let mut heard_voice = false;
        let mut trailing_silence = Duration::ZERO;

        loop {
            match self.control.load(Ordering::SeqCst) {
                ABORT => return Capture::Aborted,
                STOP => break,
                _ => {}
            }
            if self.feed.is_lost() {
                log::warn!("recognition: audio feed lost");
                return Capture::Lost;
            }

            pending.extend(self.feed.drain());
            let whole = pending.len() - pending.len() % FRAME_SAMPLES;
            for frame in pending[..whole].chunks_exact(FRAME_SAMPLES) {
                if vad.is_voice(frame) {
                    heard_voice = true;
                    trailing_silence = Duration::ZERO;
                    utterance.extend_from_slice(frame);
                } else if heard_voice {
                    trailing_silence += FRAME_DURATION;
                    utterance.extend_from_slice(frame);
                }
            }
            pending.drain(..whole);

            if heard_voice
                && (trailing_silence >= self.settings.end_of_utterance
                    || utterance.len() >= MAX_UTTERANCE_SAMPLES)
            {
                self.emit(RecognitionEvent::SpeechEnded);
                break;
            }
            if !heard_voice && started.elapsed() >= self.settings.no_speech_window {
                return Capture::NoSpeech;
            }

            std::thread::sleep(self.settings.poll_interval);
        }

        if heard_voice {
            Capture::Utterance(utterance)
        } else {
            Capture::Nothing
        }
    }

    fn transcribe(&self, audio: &[f32]) {
        let vad = VadDetector::new(self.settings.vad_threshold);
        match self.engine.transcribe(vad.trim_silence(audio)) {
            Ok(text) if !text.is_empty() => self.emit(RecognitionEvent::Result {
                text,
                is_final: true,
            }),
            Ok(_) | Err(SttError::AudioTooShort) => {
                self.emit(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech));
            }
            Err(e) => {
                log::warn!("recognition: transcription failed: {e}");
                self.emit(RecognitionEvent::Error(RecognitionErrorKind::Other(
                    e.to_string(),
                )));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFeed;
    use crate::stt::MockSttEngine;
    use tokio::sync::mpsc;

    fn settings() -> RecognizerSettings {
        RecognizerSettings {
            end_of_utterance: Duration::from_millis(90),
            no_speech_window: Duration::from_millis(500),
            vad_threshold: 0.01,
            poll_interval: Duration::from_millis(5),
        }
    }

    fn recognizer(engine: MockSttEngine) -> (WhisperRecognizer, SharedFeed) {
        let feed: SharedFeed = Arc::new(AudioFeed::new(16_000 * 5));
        let rec = WhisperRecognizer::new(Arc::new(engine), Arc::clone(&feed), settings());
        (rec, feed)
    }

    /// Collect events until `Ended` (or a 5 s deadline).
    fn collect(rx: &mut mpsc::UnboundedReceiver<(u64, RecognitionEvent)>) -> Vec<RecognitionEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            match rx.try_recv() {
                Ok((_, event)) => {
                    let done = event == RecognitionEvent::Ended;
                    events.push(event);
                    if done {
                        break;
                    }
                }
                Err(_) => std::thread::sleep(Duration::from_millis(2)),
            }
        }
        events
    }

    fn wait_started(rx: &mut mpsc::UnboundedReceiver<(u64, RecognitionEvent)>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Ok((_, RecognitionEvent::Started)) = rx.try_recv() {
                return;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("recognizer never started");
    }

    #[test]
    fn voice_then_silence_produces_final_result() {
        let (mut rec, feed) = recognizer(MockSttEngine::ok("I led the migration"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        rec.start(RecognitionSink::new(1, tx)).unwrap();
        wait_started(&mut rx);

        feed.push(&vec![0.3; 8_000]);
        feed.push(&vec![0.0; 4_800]);

        let events = collect(&mut rx);
        assert_eq!(
            events,
            vec![
                RecognitionEvent::SpeechEnded,
                RecognitionEvent::Result {
                    text: "I led the migration".into(),
                    is_final: true
                },
                RecognitionEvent::Ended,
            ]
        );
    }

    #[test]
    fn silence_reports_no_speech() {
        let (mut rec, _feed) = recognizer(MockSttEngine::ok("unused"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        rec.start(RecognitionSink::new(1, tx)).unwrap();
        wait_started(&mut rx);

        assert_eq!(
            collect(&mut rx),
            vec![
                RecognitionEvent::Error(RecognitionErrorKind::NoSpeech),
                RecognitionEvent::Ended
            ]
        );
    }

    #[test]
    fn lost_feed_reports_capture_error() {
        let (mut rec, feed) = recognizer(MockSttEngine::ok("unused"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        rec.start(RecognitionSink::new(1, tx)).unwrap();
        wait_started(&mut rx);

        feed.mark_lost();
        assert_eq!(
            collect(&mut rx),
            vec![
                RecognitionEvent::Error(RecognitionErrorKind::AudioCapture),
                RecognitionEvent::Ended
            ]
        );
    }

    #[test]
    fn second_start_is_rejected_while_live() {
        let (mut rec, _feed) = recognizer(MockSttEngine::ok("unused"));
        let (tx, _rx) = mpsc::unbounded_channel();
        rec.start(RecognitionSink::new(1, tx.clone())).unwrap();
        assert_eq!(
            rec.start(RecognitionSink::new(2, tx)),
            Err(RecognitionError::AlreadyRunning)
        );
    }

    #[test]
    fn abort_frees_the_recognizer_immediately() {
        let (mut rec, _feed) = recognizer(MockSttEngine::ok("unused"));
        let (tx, _rx) = mpsc::unbounded_channel();
        rec.start(RecognitionSink::new(1, tx.clone())).unwrap();
        rec.abort();
        assert!(rec.start(RecognitionSink::new(2, tx)).is_ok());
    }

    #[test]
    fn restart_after_abort_waits_for_previous_capture() {
        let (mut rec, feed) = recognizer(MockSttEngine::ok("second attempt"));
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        rec.start(RecognitionSink::new(1, tx1)).unwrap();
        wait_started(&mut rx1);

        rec.abort();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        rec.start(RecognitionSink::new(2, tx2)).unwrap();
        assert!(rec
            .retired
            .iter()
            .all(|worker| !worker.capturing.load(Ordering::SeqCst)));
        wait_started(&mut rx2);

        feed.push(&vec![0.3; 8_000]);
        feed.push(&vec![0.0; 4_800]);
        let events = collect(&mut rx2);
        assert!(events.contains(&RecognitionEvent::Result {
            text: "second attempt".into(),
            is_final: true
        }));
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn finished_workers_are_joined_on_next_start() {
        let (mut rec, _feed) = recognizer(MockSttEngine::ok("unused"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        rec.start(RecognitionSink::new(1, tx.clone())).unwrap();
        wait_started(&mut rx);
        rec.stop();
        assert_eq!(collect(&mut rx), vec![RecognitionEvent::Ended]);

        let previous = rec.worker.as_ref().unwrap();
        assert!(!previous.live.load(Ordering::SeqCst));
        let deadline = Instant::now() + Duration::from_secs(5);
        while !previous.handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        rec.start(RecognitionSink::new(2, tx)).unwrap();
        assert!(rec.retired.is_empty());
    }

    #[test]
    fn stop_without_voice_just_ends() {
        let (mut rec, _feed) = recognizer(MockSttEngine::ok("unused"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        rec.start(RecognitionSink::new(1, tx)).unwrap();
        wait_started(&mut rx);
        rec.stop();
        assert_eq!(collect(&mut rx), vec![RecognitionEvent::Ended]);
    }
}
