//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the interview
//! defaults, the remote model and the voice loop, `AppPaths` for
//! cross-platform directories, and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, InterviewSettings, LlmConfig, SessionTimings, VoiceConfig, API_KEY_ENV,
};
