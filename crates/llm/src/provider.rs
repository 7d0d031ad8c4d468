//! The text-completion seam and its Gemini implementation.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::CollaboratorError;
use serde::{Deserialize, Serialize};

/// A model that turns one prompt into one text answer.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name used in diagnostics.
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// Settings for [`GeminiProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiConfig {
    /// Base URL, without the `/v1beta/...` path.
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash";
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::DEFAULT_ENDPOINT.into(),
            model: Self::DEFAULT_MODEL.into(),
            api_key: String::new(),
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Google Gemini `generateContent` over REST.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Fails with [`CollaboratorError::Unavailable`] if no API key is set.
    pub fn new(config: GeminiConfig) -> Result<Self, CollaboratorError> {
        if config.api_key.trim().is_empty() {
            return Err(CollaboratorError::Unavailable {
                collaborator: "gemini".into(),
                reason: "API key is not set".into(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::Unavailable {
                collaborator: "gemini".into(),
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self { http, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [PartOut<'a>; 1],
}

#[derive(Debug, Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartIn>,
}

#[derive(Debug, Default, Deserialize)]
struct PartIn {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [PartOut { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        };

        tracing::debug!(model = %self.config.model, prompt_chars = prompt.len(), "calling gemini");
        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout {
                        collaborator: "gemini".into(),
                        after: self.config.timeout,
                    }
                } else {
                    CollaboratorError::Http {
                        service: "gemini".into(),
                        status: None,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http {
                service: "gemini".into(),
                status: Some(status.as_u16()),
                message: text.chars().take(300).collect(),
            });
        }

        let parsed: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::InvalidResponse {
                    collaborator: "gemini".into(),
                    message: e.to_string(),
                })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(CollaboratorError::InvalidResponse {
                collaborator: "gemini".into(),
                message: "response has no text".into(),
            });
        }
        Ok(text.trim().to_string())
    }
}
