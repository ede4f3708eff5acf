//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to the session
//! runner by value.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::interview::{InterviewConfig, QuestionLimits};

// ---------------------------------------------------------------------------
// InterviewSettings
// ---------------------------------------------------------------------------

const DEFAULT_CV: &str = "Candidate is a software engineer with experience in TypeScript, React, and cloud services. Key strengths include building customer-facing web applications, collaborating with cross-functional teams, and mentoring junior developers.";

const DEFAULT_JOB_POSTING: &str = "Company is hiring a senior full-stack engineer to build AI-assisted interview experiences. The role values practical problem solving, system design rigor, and effective communication across product and research teams.";

/// Defaults and limits for the interview shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewSettings {
    /// Config used when the user does not supply one.
    pub config: InterviewConfig,
    /// CV text sent to the model when none was uploaded.
    pub cv_content: String,
    /// Job-posting text sent to the model when none was uploaded.
    pub job_posting_content: String,
    /// Floor for the question goal.
    pub minimum_questions: u32,
    /// Per-category clamp range.
    pub limits: QuestionLimits,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            config: InterviewConfig::default(),
            cv_content: DEFAULT_CV.into(),
            job_posting_content: DEFAULT_JOB_POSTING.into(),
            minimum_questions: 6,
            limits: QuestionLimits::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Environment variable consulted when `llm.api_key` is not set.
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Settings for the remote interview model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the chat-completions API (no trailing `/v1`).
    pub base_url: String,
    /// API key.  `None` means "read [`API_KEY_ENV`] at request time".
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Token cap for interviewer turns.
    pub max_tokens: u32,
    /// Token cap for code reviews.
    pub review_max_tokens: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai".into(),
            api_key: None,
            model: "mistral-small-latest".into(),
            temperature: 0.7,
            max_tokens: 200,
            review_max_tokens: 1000,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    /// The configured key, or the environment fallback.  Blank keys count as
    /// missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

// ---------------------------------------------------------------------------
// VoiceConfig
// ---------------------------------------------------------------------------

/// Speech recognition / synthesis settings and the session timer constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Recognition language (ISO-639-1), or `"auto"`.
    pub language: String,
    /// GGML model file stem under the models directory.
    pub whisper_model: String,
    /// Synthesis playback rate; `1.0` is normal speed.
    pub speech_rate: f32,
    /// External speech command (`say`, `espeak`, `espeak-ng`); unset means
    /// no speech output.
    pub tts_command: Option<String>,
    /// Force-stop recognition when no result arrives within this window.
    pub silence_timeout_ms: u64,
    /// Consecutive "no speech" errors tolerated before advising the user.
    pub max_no_speech_retries: u32,
    /// Delay before retrying after a "no speech" error.
    pub no_speech_retry_ms: u64,
    /// Gap between the stop and start of a no-speech retry.
    pub retry_settle_ms: u64,
    /// Delay before restarting after recognition ends on its own.
    pub natural_restart_ms: u64,
    /// Delay before restarting recognition on a newly selected microphone.
    pub mic_switch_settle_ms: u64,
    /// Trailing silence that ends an utterance.
    pub end_of_utterance_ms: u64,
    /// Report "no speech" when nothing is heard within this window.
    pub no_speech_window_ms: u64,
    /// RMS level above which a frame counts as voice.
    pub vad_threshold: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: "en".into(),
            whisper_model: "ggml-base.en".into(),
            speech_rate: 0.95,
            tts_command: None,
            silence_timeout_ms: 15_000,
            max_no_speech_retries: 3,
            no_speech_retry_ms: 1_000,
            retry_settle_ms: 300,
            natural_restart_ms: 500,
            mic_switch_settle_ms: 200,
            end_of_utterance_ms: 900,
            no_speech_window_ms: 8_000,
            vad_threshold: 0.01,
        }
    }
}

/// Timer durations resolved from [`VoiceConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub silence_timeout: Duration,
    pub no_speech_retry: Duration,
    pub retry_settle: Duration,
    pub natural_restart: Duration,
    pub mic_switch_settle: Duration,
    pub max_no_speech_retries: u32,
}

impl Default for SessionTimings {
    fn default() -> Self {
        VoiceConfig::default().timings()
    }
}

impl VoiceConfig {
    pub fn timings(&self) -> SessionTimings {
        SessionTimings {
            silence_timeout: Duration::from_millis(self.silence_timeout_ms),
            no_speech_retry: Duration::from_millis(self.no_speech_retry_ms),
            retry_settle: Duration::from_millis(self.retry_settle_ms),
            natural_restart: Duration::from_millis(self.natural_restart_ms),
            mic_switch_settle: Duration::from_millis(self.mic_switch_settle_ms),
            max_no_speech_retries: self.max_no_speech_retries.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use interview_voice::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// assert_eq!(config.voice.silence_timeout_ms, 15_000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub interview: InterviewSettings,
    pub llm: LlmConfig,
    pub voice: VoiceConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
