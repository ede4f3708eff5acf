//! Cross-platform application paths using the `dirs` crate.
//!
//! Config dir (settings + preferences):
//!   Windows: %APPDATA%\interview-voice\
//!   macOS:   ~/Library/Application Support/interview-voice/
//!   Linux:   ~/.config/interview-voice/
//!
//! Data dir (Whisper models):
//!   Windows: %LOCALAPPDATA%\interview-voice\
//!   macOS:   ~/Library/Application Support/interview-voice/
//!   Linux:   ~/.local/share/interview-voice/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// `settings.toml`.
    pub settings_file: PathBuf,
    /// `preferences.json`: small key-value store (selected microphone).
    pub preferences_file: PathBuf,
    /// Directory holding GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "interview-voice";

    /// Resolves all paths, falling back to the current directory when the
    /// platform has no standard location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            preferences_file: config_dir.join("preferences.json"),
            models_dir: data_dir.join("models"),
            config_dir,
        }
    }

    /// Full path of the GGML file for `model` (file stem, no extension).
    pub fn model_file(&self, model: &str) -> PathBuf {
        self.models_dir.join(format!("{model}.bin"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
