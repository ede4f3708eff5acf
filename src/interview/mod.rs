//! Interview domain types.
//!
//! * [`InterviewConfig`] / [`Difficulty`] / [`QuestionLimits`]: session shape
//!   and its normalization.
//! * [`question_goal`] / [`QuestionBucket`]: turn target and category lookup.
//! * [`SessionMessage`] / [`Transcript`]: the deduplicated conversation log.

pub mod config;
pub mod message;

pub use config::{question_goal, Difficulty, InterviewConfig, QuestionBucket, QuestionLimits};
pub use message::{greeting_text, Role, SessionMessage, Source, Transcript};
