//! Transcription parameters and transcript cleanup.
//!
//! [`TranscribeParams`] carries the settings for one Whisper pass.
//! [`clean_transcript`] strips the non-speech annotations Whisper emits for
//! silence and noise so they never reach the interview as an "answer".

use regex::Regex;
use std::sync::OnceLock;

/// Settings for a single Whisper inference run.
///
/// ```
/// use interview_voice::stt::TranscribeParams;
///
/// let params = TranscribeParams::for_language("en-US");
/// assert_eq!(params.language, "en");
/// ```
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// ISO-639-1 code, or `"auto"` for detection.
    pub language: String,

    /// CPU threads handed to Whisper.  Defaults to [`optimal_threads()`].
    pub n_threads: i32,

    /// Answers are independent; earlier text must not bias the decoder.
    pub no_context: bool,

    /// Suppress Whisper's progress output to stderr.
    pub suppress_progress: bool,
}

impl TranscribeParams {
    /// Accepts BCP-47 tags (`"en-US"`) and keeps only the primary subtag.
    pub fn for_language(language: &str) -> Self {
        let primary = language
            .split(['-', '_'])
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("en")
            .to_ascii_lowercase();
        Self {
            language: primary,
            ..Self::default()
        }
    }
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            n_threads: optimal_threads(),
            no_context: true,
            suppress_progress: true,
        }
    }
}

/// Available parallelism capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

fn annotation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // [BLANK_AUDIO], (silence), [Music], *coughs* ...
    PATTERN.get_or_init(|| {
        Regex::new(r"\[[^\]]*\]|\([^)]*\)|\*[^*]*\*").expect("annotation pattern is valid")
    })
}

/// Remove bracketed annotations and collapse whitespace.
///
/// ```
/// use interview_voice::stt::clean_transcript;
///
/// assert_eq!(clean_transcript(" [BLANK_AUDIO] "), "");
/// assert_eq!(clean_transcript("I led the  (coughs) migration"), "I led the migration");
/// ```
pub fn clean_transcript(raw: &str) -> String {
    let stripped = annotation_pattern().replace_all(raw, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tag_is_reduced_to_primary_subtag() {
        assert_eq!(TranscribeParams::for_language("EN_gb").language, "en");
        assert_eq!(TranscribeParams::for_language("").language, "en");
        assert_eq!(TranscribeParams::for_language("auto").language, "auto");
    }

    #[test]
    fn threads_are_bounded() {
        let t = optimal_threads();
        assert!((1..=8).contains(&t));
    }

    #[test]
    fn annotations_only_clean_to_empty() {
        assert!(clean_transcript("[Music] (silence) *breathing*").is_empty());
    }

    #[test]
    fn speech_text_is_preserved() {
        assert_eq!(
            clean_transcript("  I have five years of Rust.  "),
            "I have five years of Rust."
        );
    }
}
