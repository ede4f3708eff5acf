//! Offline speech-to-text used by the recognition backend.
//!
//! ```text
//! utterance (16 kHz mono f32) ──▶ SttEngine::transcribe ──▶ cleaned text
//!                                   └─ WhisperEngine (whisper-rs)
//! ```
//!
//! ```rust,no_run
//! use interview_voice::config::AppPaths;
//! use interview_voice::stt::{SttEngine, TranscribeParams, WhisperEngine};
//!
//! let model = AppPaths::new().model_file("ggml-base.en");
//! let engine = WhisperEngine::load(model, TranscribeParams::for_language("en")).unwrap();
//! let text = engine.transcribe(&vec![0.0; 16_000]).unwrap();
//! println!("{text}");
//! ```

pub mod engine;
pub mod transcribe;

pub use engine::{SttEngine, SttError, WhisperEngine, MAX_UTTERANCE_SAMPLES, MIN_SPEECH_SAMPLES};
pub use transcribe::{clean_transcript, TranscribeParams};

#[cfg(test)]
pub use engine::MockSttEngine;
