//! Voice interview practice: a spoken mock-interview session driven by a
//! remote language model.
//!
//! The crate is organised by subsystem:
//!
//! * [`session`] runs the turn-taking state machine (listening → thinking →
//!   speaking) and executes its effects.
//! * [`speech`] keeps a single-utterance recognizer listening and speaks the
//!   interviewer's turns.
//! * [`audio`] owns the microphone stream and the 16 kHz sample feed.
//! * [`stt`] wraps Whisper for offline transcription.
//! * [`llm`] talks to the interview model and parses code reviews.
//! * [`interview`], [`config`] and [`storage`] hold the data model, settings
//!   and persisted preferences.

pub mod audio;
pub mod config;
pub mod interview;
pub mod llm;
pub mod session;
pub mod speech;
pub mod storage;
pub mod stt;
