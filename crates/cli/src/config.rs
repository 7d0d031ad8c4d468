//! Runtime configuration: `captionflow.toml` plus environment overrides.
//!
//! Every section has defaults, so an absent file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pipeline::scoring::DEFAULT_BANNED_TERMS;
use pipeline::{CaptionFlowError, ScoringPolicy, DEFAULT_MAX_REVISIONS};
use serde::Deserialize;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "captionflow.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub pipeline: PipelineSection,
    pub scoring: ScoringSection,
    pub generation: GenerationSection,
    pub trends: TrendsSection,
    pub media: MediaSection,
    pub embedding: EmbeddingSection,
    pub telemetry: TelemetrySection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub max_revisions: u32,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_revisions: DEFAULT_MAX_REVISIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringSection {
    pub banned_terms: Vec<String>,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            banned_terms: DEFAULT_BANNED_TERMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScoringSection {
    pub fn policy(&self) -> ScoringPolicy {
        ScoringPolicy {
            banned_terms: self.banned_terms.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationSection {
    pub model: String,
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    /// Caption language used when the job manifest names none.
    pub language: String,
    /// Resolved from `api_key_env`; never read from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            model: llm::GeminiConfig::DEFAULT_MODEL.into(),
            endpoint: llm::GeminiConfig::DEFAULT_ENDPOINT.into(),
            api_key_env: "GEMINI_API_KEY".into(),
            timeout_secs: 60,
            temperature: 0.7,
            language: "tr".into(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrendsSection {
    /// Related-queries service; seeds are used as trend terms when unset.
    pub endpoint: Option<String>,
    pub geo: String,
    pub language: String,
    pub timeframe: String,
    pub timeout_secs: u64,
}

impl Default for TrendsSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            geo: "TR".into(),
            language: "tr-TR".into(),
            timeframe: "now 7-d".into(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaSection {
    pub ffprobe_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub asr_command: Option<PathBuf>,
    pub asr_model: String,
    pub language: String,
    pub captioner_command: Option<PathBuf>,
    pub tool_timeout_secs: u64,
}

impl Default for MediaSection {
    fn default() -> Self {
        Self {
            ffprobe_path: None,
            ffmpeg_path: None,
            asr_command: None,
            asr_model: "base".into(),
            language: "tr".into(),
            captioner_command: None,
            tool_timeout_secs: 120,
        }
    }
}

impl MediaSection {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Sentence-embedding model used for trend fit.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingSection {
    /// Model download cache; the library default when unset.
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
}

impl EmbeddingSection {
    pub fn model_config(&self) -> llm::EmbeddingConfig {
        llm::EmbeddingConfig {
            cache_dir: self.cache_dir.clone(),
            show_download_progress: self.show_download_progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySection {
    /// OTLP/gRPC collector; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: "captionflow".into(),
        }
    }
}

fn config_error(message: impl Into<String>) -> CaptionFlowError {
    CaptionFlowError::Configuration {
        message: message.into(),
    }
}

impl AppConfig {
    /// Parses a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, CaptionFlowError> {
        toml::from_str(raw).map_err(|e| config_error(format!("invalid TOML: {e}")))
    }

    /// Loads `path`, or `captionflow.toml` if present, or the defaults; then
    /// applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, CaptionFlowError> {
        let mut config = match path {
            Some(p) => Self::read(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::read(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, CaptionFlowError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&raw)
    }

    /// Applies environment overrides, looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("FFPROBE_PATH") {
            self.media.ffprobe_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("FFMPEG_PATH") {
            self.media.ffmpeg_path = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("WHISPER_MODEL") {
            self.media.asr_model = v;
        }
        if let Some(v) = non_empty("WHISPER_LANG") {
            self.media.language = v;
        }
        if let Some(v) = non_empty("EMBEDDING_CACHE_DIR") {
            self.embedding.cache_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("GEMINI_MODEL") {
            self.generation.model = v;
        }
        self.generation.api_key = non_empty(&self.generation.api_key_env);
    }

    /// Rejects values no run could work with.
    pub fn validate(&self) -> Result<(), CaptionFlowError> {
        if self.generation.model.trim().is_empty() {
            return Err(config_error("generation.model must not be empty"));
        }
        if self.generation.timeout_secs == 0 {
            return Err(config_error("generation.timeout_secs must be positive"));
        }
        if self.trends.timeout_secs == 0 {
            return Err(config_error("trends.timeout_secs must be positive"));
        }
        if self.media.tool_timeout_secs == 0 {
            return Err(config_error("media.tool_timeout_secs must be positive"));
        }
        if let Some(endpoint) = &self.trends.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(config_error(format!(
                    "trends.endpoint '{endpoint}' is not an http(s) URL"
                )));
            }
        }
        Ok(())
    }

    /// The API key, required for `run`.
    pub fn require_api_key(&self) -> Result<&str, CaptionFlowError> {
        self.generation.api_key.as_deref().ok_or_else(|| {
            config_error(format!(
                "environment variable {} is not set",
                self.generation.api_key_env
            ))
        })
    }
}
