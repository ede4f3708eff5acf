//! Recognition engine interface.
//!
//! A [`SpeechRecognizer`] runs one *attempt* at a time.  Everything it
//! observes is reported as a [`RecognitionEvent`] through the
//! [`RecognitionSink`] it was started with; the sink tags each event with
//! the attempt id so late events from an abandoned attempt can be told apart.

use thiserror::Error;
use tokio::sync::mpsc;

/// Engine-level recognition failure kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// The attempt ended without hearing any speech.
    NoSpeech,
    /// The audio input disappeared or could not be read.
    AudioCapture,
    /// Anything else; logged only.
    Other(String),
}

/// What a recognizer reports during an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Started,
    /// The speaker went quiet; a final result usually follows.
    SpeechEnded,
    Result { text: String, is_final: bool },
    Error(RecognitionErrorKind),
    /// Always the last event of an attempt.
    Ended,
}

/// Failures raised synchronously by [`SpeechRecognizer::start`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("recognition is already running")]
    AlreadyRunning,

    #[error("speech recognition is unavailable: {0}")]
    Unavailable(String),
}

/// Attempt-tagged event channel handed to the recognizer.
#[derive(Debug, Clone)]
pub struct RecognitionSink {
    attempt: u64,
    tx: mpsc::UnboundedSender<(u64, RecognitionEvent)>,
}

impl RecognitionSink {
    pub fn new(attempt: u64, tx: mpsc::UnboundedSender<(u64, RecognitionEvent)>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Returns `false` once the receiving session is gone.
    pub fn emit(&self, event: RecognitionEvent) -> bool {
        self.tx.send((self.attempt, event)).is_ok()
    }
}

/// Speech-to-text engine with start / stop / abort semantics.
///
/// * `start` begins an attempt; it must emit `Started` and eventually `Ended`.
/// * `stop` finishes the current utterance (a final result may still follow).
/// * `abort` drops the attempt without a result.
pub trait SpeechRecognizer {
    fn start(&mut self, sink: RecognitionSink) -> Result<(), RecognitionError>;
    fn stop(&mut self);
    fn abort(&mut self);
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// Records calls; events are injected by the test through the sink it keeps.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub struct FakeRecognizerLog {
        pub starts: Vec<u64>,
        pub stops: usize,
        pub aborts: usize,
        pub sink: Option<RecognitionSink>,
    }

    pub struct FakeRecognizer {
        pub log: Arc<Mutex<FakeRecognizerLog>>,
        /// Emit `Started` immediately from `start`.
        pub auto_started: bool,
    }

    impl FakeRecognizer {
        pub fn new() -> (Self, Arc<Mutex<FakeRecognizerLog>>) {
            let log = Arc::new(Mutex::new(FakeRecognizerLog::default()));
            (
                Self {
                    log: Arc::clone(&log),
                    auto_started: true,
                },
                log,
            )
        }
    }

    impl SpeechRecognizer for FakeRecognizer {
        fn start(&mut self, sink: RecognitionSink) -> Result<(), RecognitionError> {
            let mut log = self.log.lock().unwrap();
            log.starts.push(sink.attempt());
            if self.auto_started {
                sink.emit(RecognitionEvent::Started);
            }
            log.sink = Some(sink);
            Ok(())
        }

        fn stop(&mut self) {
            let mut log = self.log.lock().unwrap();
            log.stops += 1;
            if let Some(sink) = &log.sink {
                sink.emit(RecognitionEvent::Ended);
            }
        }

        fn abort(&mut self) {
            let mut log = self.log.lock().unwrap();
            log.aborts += 1;
            log.sink = None;
        }
    }
}
