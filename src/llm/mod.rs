//! Remote inference for the interview: question generation and code review.
//!
//! This module provides:
//! * [`InterviewModel`]: async trait the session calls for each turn.
//! * [`MistralClient`]: Mistral `/v1/chat/completions` backend.
//! * [`PromptBuilder`]: interviewer and reviewer prompts.
//! * [`CodeReview`]: score / issues / suggestions parsed from review text.
//! * [`InferenceError`]: failures, classified by [`InferenceErrorKind`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use interview_voice::config::AppConfig;
//! use interview_voice::interview::InterviewConfig;
//! use interview_voice::llm::{InterviewModel, InterviewRequest, MistralClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let model = MistralClient::from_config(&config.llm);
//!
//!     let request = InterviewRequest {
//!         transcript: "I have been writing Rust for three years.".into(),
//!         cv_content: Some(config.interview.cv_content.clone()),
//!         job_posting_content: None,
//!         config: InterviewConfig::default(),
//!         question_count: 0,
//!         question_goal: 9,
//!         candidate_name: None,
//!     };
//!     match model.ask(&request).await {
//!         Ok(question) => println!("{question}"),
//!         Err(e) => eprintln!("{e} ({:?})", e.kind()),
//!     }
//! }
//! ```

pub mod client;
pub mod prompt;
pub mod review;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{InferenceError, InferenceErrorKind, InterviewModel, MistralClient};
pub use prompt::{CodeReviewRequest, InterviewRequest, PromptBuilder};
pub use review::{CodeReview, DEFAULT_REVIEW_SCORE};
