//! Text-to-speech playback.
//!
//! The session treats every synthesis outcome the same way: playback is
//! over and listening may resume.  Errors are only logged.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("speech synthesis is unavailable")]
    Unavailable,

    #[error("speech synthesis failed: {0}")]
    Failed(String),

    #[error("speech playback was cancelled")]
    Cancelled,
}

/// Speaks text aloud.
///
/// `speak` resolves when playback finishes.  `cancel` interrupts whatever is
/// playing; the interrupted `speak` resolves with
/// [`SynthesisError::Cancelled`].
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str, rate: f32) -> Result<(), SynthesisError>;
    fn cancel(&self);
}

/// Host without speech output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSynthesizer;

#[async_trait]
impl SpeechSynthesizer for NullSynthesizer {
    async fn speak(&self, _text: &str, _rate: f32) -> Result<(), SynthesisError> {
        Err(SynthesisError::Unavailable)
    }

    fn cancel(&self) {}
}

/// Words per minute at rate 1.0 for `say` / `espeak`.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Speaks through an external command (`say`, `espeak`, `espeak-ng`).
///
/// The text is passed as the last argument; `-r` (say) or `-s` (espeak)
/// carries the rate in words per minute.
pub struct CommandSynthesizer {
    program: String,
    cancel: Notify,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            cancel: Notify::new(),
        }
    }

    fn args(&self, text: &str, rate: f32) -> Vec<String> {
        let wpm = (BASE_WORDS_PER_MINUTE * rate.clamp(0.25, 4.0)).round() as u32;
        let rate_flag = if self.program.ends_with("say") { "-r" } else { "-s" };
        vec![rate_flag.to_string(), wpm.to_string(), text.to_string()]
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn speak(&self, text: &str, rate: f32) -> Result<(), SynthesisError> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(self.args(text, rate))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SynthesisError::Unavailable
                } else {
                    SynthesisError::Failed(e.to_string())
                }
            })?;

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| SynthesisError::Failed(e.to_string()))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(SynthesisError::Failed(format!("{} exited with {status}", self.program)))
                }
            }
            _ = self.cancel.notified() => {
                let _ = child.kill().await;
                Err(SynthesisError::Cancelled)
            }
        }
    }

    fn cancel(&self) {
        self.cancel.notify_waiters();
    }
}
