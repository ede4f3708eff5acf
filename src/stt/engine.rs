//! Speech-to-text engine trait and the Whisper implementation.
//!
//! [`SttEngine`] is object-safe and `Send + Sync` so the recognizer can hold
//! it behind an `Arc<dyn SttEngine>` and call it from its worker thread.
//!
//! [`WhisperEngine`] wraps a `whisper_rs::WhisperContext`; a fresh
//! `WhisperState` is created for every call so no locking is needed.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::stt::transcribe::{clean_transcript, TranscribeParams};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SttError {
    #[error("Whisper model not found: {0}")]
    ModelNotFound(String),

    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    /// Clip is too short to hold a spoken word.
    #[error("Audio too short (minimum 0.25 s at 16 kHz)")]
    AudioTooShort,
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Thread-safe speech-to-text interface.
///
/// # Contract
///
/// - `audio` is **16 kHz mono f32** PCM.
/// - Clips under [`MIN_SPEECH_SAMPLES`] fail with [`SttError::AudioTooShort`].
/// - Clips over [`MAX_UTTERANCE_SAMPLES`] are truncated to their tail.
/// - The returned text has non-speech annotations removed and may be empty.
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SttEngine>) {}
};

/// 0.25 s at 16 kHz.
pub const MIN_SPEECH_SAMPLES: usize = 4_000;
/// Whisper.cpp warns on inputs under one second; shorter clips are padded.
const WHISPER_MIN_SAMPLES: usize = 16_000;
/// Two minutes of answer at 16 kHz.
pub const MAX_UTTERANCE_SAMPLES: usize = 16_000 * 120;

/// Apply the length contract: reject, pad with trailing silence, or keep the
/// most recent [`MAX_UTTERANCE_SAMPLES`].
pub(crate) fn prepare_audio(audio: &[f32]) -> Result<Vec<f32>, SttError> {
    if audio.len() < MIN_SPEECH_SAMPLES {
        return Err(SttError::AudioTooShort);
    }
    let start = audio.len().saturating_sub(MAX_UTTERANCE_SAMPLES);
    let mut clip = audio[start..].to_vec();
    if clip.len() < WHISPER_MIN_SAMPLES {
        clip.resize(WHISPER_MIN_SAMPLES, 0.0);
    }
    Ok(clip)
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

pub struct WhisperEngine {
    ctx: WhisperContext,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs; the model
// weights are read-only after loading.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model from `model_path`.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`] when `model_path` does not exist.
    /// - [`SttError::ContextInit`] when whisper-rs rejects the file.
    pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!("stt: loaded {} (language {})", path.display(), params.language);
        Ok(Self { ctx, params })
    }

    fn full_params(&self) -> FullParams<'_, '_> {
        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        let lang = (self.params.language != "auto").then_some(self.params.language.as_str());
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        fp.set_no_context(self.params.no_context);
        fp.set_suppress_blank(true);
        fp.set_print_special(false);
        fp.set_print_timestamps(false);

        if self.params.suppress_progress {
            fp.set_print_progress(false);
            fp.set_print_realtime(false);
        }
        fp
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        let clip = prepare_audio(audio)?;

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let started = std::time::Instant::now();
        state
            .full(self.full_params(), &clip)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        let cleaned = clean_transcript(&text);
        log::debug!(
            "stt: {:.1}s of audio → {} chars in {} ms",
            clip.len() as f32 / 16_000.0,
            cleaned.len(),
            started.elapsed().as_millis()
        );
        Ok(cleaned)
    }
}

// ---------------------------------------------------------------------------
// MockSttEngine  (test-only)
// ---------------------------------------------------------------------------

/// Returns queued responses in order, then repeats the last one.
#[cfg(test)]
pub struct MockSttEngine {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, SttError>>>,
    last: std::sync::Mutex<Result<String, SttError>>,
}

#[cfg(test)]
impl MockSttEngine {
    pub fn ok(text: impl Into<String>) -> Self {
        Self::sequence(vec![Ok(text.into())])
    }

    pub fn err(error: SttError) -> Self {
        Self::sequence(vec![Err(error)])
    }

    pub fn sequence(responses: Vec<Result<String, SttError>>) -> Self {
        let last = responses.last().cloned().unwrap_or_else(|| Ok(String::new()));
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            last: std::sync::Mutex::new(last),
        }
    }
}

#[cfg(test)]
impl SttEngine for MockSttEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        prepare_audio(audio)?;
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(r) => {
                *self.last.lock().unwrap() = r.clone();
                r
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
