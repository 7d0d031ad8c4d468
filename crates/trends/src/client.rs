//! Related-query fetching.
//!
//! The trend service is any HTTP endpoint answering
//!
//! ```text
//! GET <endpoint>?q=<keyword>&geo=<geo>&hl=<language>&timeframe=<timeframe>
//! ```
//!
//! with `{"top": [{"query": "...", "value": 80}, ...]}`. A missing `value`
//! counts as 50.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::CollaboratorError;
use serde::Deserialize;

/// Value assumed for a related query that carries none.
pub const DEFAULT_QUERY_VALUE: u64 = 50;

const SERVICE: &str = "trends";

/// One related query and its popularity value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RelatedQuery {
    pub query: String,
    #[serde(default = "default_value")]
    pub value: u64,
}

fn default_value() -> u64 {
    DEFAULT_QUERY_VALUE
}

#[derive(Debug, Default, Deserialize)]
struct RelatedQueriesResponse {
    #[serde(default)]
    top: Vec<RelatedQuery>,
}

/// Source of related queries for one keyword.
#[async_trait]
pub trait TrendFetcher: Send + Sync {
    async fn related_queries(&self, keyword: &str) -> Result<Vec<RelatedQuery>, CollaboratorError>;
}

/// Settings for [`HttpTrendFetcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrendServiceConfig {
    pub endpoint: String,
    pub geo: String,
    pub language: String,
    pub timeframe: String,
    pub timeout: Duration,
}

impl Default for TrendServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            geo: "TR".into(),
            language: "tr-TR".into(),
            timeframe: "now 7-d".into(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// [`TrendFetcher`] over the HTTP trend service.
#[derive(Debug, Clone)]
pub struct HttpTrendFetcher {
    client: reqwest::Client,
    config: TrendServiceConfig,
}

impl HttpTrendFetcher {
    pub fn new(config: TrendServiceConfig) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::Unavailable {
                collaborator: SERVICE.into(),
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TrendFetcher for HttpTrendFetcher {
    async fn related_queries(&self, keyword: &str) -> Result<Vec<RelatedQuery>, CollaboratorError> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("q", keyword),
                ("geo", self.config.geo.as_str()),
                ("hl", self.config.language.as_str()),
                ("timeframe", self.config.timeframe.as_str()),
            ])
            .send()
            .await
            .map_err(|e| map_reqwest(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http {
                service: SERVICE.into(),
                status: Some(status.as_u16()),
                message: body.chars().take(200).collect(),
            });
        }

        let parsed: RelatedQueriesResponse =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::InvalidResponse {
                    collaborator: SERVICE.into(),
                    message: e.to_string(),
                })?;
        Ok(parsed.top)
    }
}

/// Stand-in used when no trend endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unconfigured;

#[async_trait]
impl TrendFetcher for Unconfigured {
    async fn related_queries(&self, _keyword: &str) -> Result<Vec<RelatedQuery>, CollaboratorError> {
        Err(CollaboratorError::Unavailable {
            collaborator: SERVICE.into(),
            reason: "no trend endpoint configured".into(),
        })
    }
}

fn map_reqwest(e: reqwest::Error, timeout: Duration) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout {
            collaborator: SERVICE.into(),
            after: timeout,
        }
    } else {
        CollaboratorError::Http {
            service: SERVICE.into(),
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}
