//! `InterviewModel` trait and the Mistral chat-completions client.
//!
//! [`MistralClient`] calls `{base_url}/v1/chat/completions`.  All connection
//! details come from [`LlmConfig`]; the API key falls back to the
//! `MISTRAL_API_KEY` environment variable.  Failures are classified so the
//! session can tell a configuration problem from a connectivity one.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::llm::prompt::{CodeReviewRequest, InterviewRequest, PromptBuilder};
use crate::llm::review::CodeReview;

// ---------------------------------------------------------------------------
// InferenceError
// ---------------------------------------------------------------------------

/// Coarse class of an [`InferenceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceErrorKind {
    /// Missing or rejected API key.  Retrying will not help.
    Credentials,
    /// Transport failure.  The user may retry.
    Network,
    Other,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Missing MISTRAL_API_KEY. Add it to your environment or to the [llm] section of settings.toml")]
    MissingCredentials,

    #[error("Mistral rejected the API key (HTTP {0}). Check MISTRAL_API_KEY")]
    InvalidCredentials(u16),

    /// The inner detail is logged, not shown.
    #[error("Network error connecting to Mistral. Confirm your internet connection and that the Mistral API key is valid")]
    Network(String),

    #[error("Failed to generate response: API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to generate response: {0}")]
    Parse(String),

    #[error("No response from AI service")]
    EmptyResponse,
}

impl InferenceError {
    pub fn kind(&self) -> InferenceErrorKind {
        match self {
            InferenceError::MissingCredentials | InferenceError::InvalidCredentials(_) => {
                InferenceErrorKind::Credentials
            }
            InferenceError::Network(_) => InferenceErrorKind::Network,
            _ => InferenceErrorKind::Other,
        }
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            InferenceError::Parse(e.to_string())
        } else {
            InferenceError::Network(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// InterviewModel trait
// ---------------------------------------------------------------------------

/// Remote text generation used by the session.
///
/// Implementors must be `Send + Sync` so they can sit behind
/// `Arc<dyn InterviewModel>` and be called from spawned tasks.
#[async_trait]
pub trait InterviewModel: Send + Sync {
    /// Next interviewer utterance for the candidate's answer.
    async fn ask(&self, request: &InterviewRequest) -> Result<String, InferenceError>;

    async fn review_code(&self, request: &CodeReviewRequest) -> Result<CodeReview, InferenceError>;
}

// ---------------------------------------------------------------------------
// MistralClient
// ---------------------------------------------------------------------------

pub struct MistralClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl MistralClient {
    /// Build a client from config, resolving the key from the environment
    /// when the config has none.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::with_api_key(config, config.resolve_api_key())
    }

    /// Build a client with an explicit key (`None` means no credentials).
    pub fn with_api_key(config: &LlmConfig, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, InferenceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(InferenceError::MissingCredentials)?;

        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user",   "content": user   }
            ],
            "temperature": self.config.temperature,
            "max_tokens":  max_tokens
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                log::warn!("llm: request to {url} failed: {e}");
                InferenceError::from(e)
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(InferenceError::InvalidCredentials(status.as_u16()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        let json: serde_json::Value = response.json().await?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(InferenceError::EmptyResponse);
        }
        Ok(content.to_string())
    }
}

/// Best-effort message from an error body: `{"message": …}`,
/// `{"error": {"message": …}}`, or the raw text.
fn api_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v["message"]
                .as_str()
                .or_else(|| v["error"]["message"].as_str())
                .or_else(|| v["error"].as_str())
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

#[async_trait]
impl InterviewModel for MistralClient {
    async fn ask(&self, request: &InterviewRequest) -> Result<String, InferenceError> {
        let (system, user) = PromptBuilder::interview(request);
        log::debug!(
            "llm: asking for question {} of {}",
            request.question_count + 1,
            request.question_goal
        );
        self.complete(&system, &user, self.config.max_tokens).await
    }

    async fn review_code(&self, request: &CodeReviewRequest) -> Result<CodeReview, InferenceError> {
        let (system, user) = PromptBuilder::code_review(request);
        let text = self
            .complete(&system, &user, self.config.review_max_tokens)
            .await?;
        Ok(CodeReview::parse(&text))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
