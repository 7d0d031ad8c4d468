//! [`CaptionGenerator`] on top of any [`LlmProvider`].

use async_trait::async_trait;
use pipeline::{CaptionGenerator, GenerationError, GenerationRequest, ParsedVariants};

use crate::parse::parse_variants;
use crate::prompt::build_prompt;
use crate::provider::LlmProvider;

/// Builds the prompt, calls the model and validates its answer.
#[derive(Debug, Clone)]
pub struct LlmCaptionGenerator<P> {
    provider: P,
}

impl<P: LlmProvider> LlmCaptionGenerator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: LlmProvider> CaptionGenerator for LlmCaptionGenerator<P> {
    async fn generate(&self, request: &GenerationRequest) -> Result<ParsedVariants, GenerationError> {
        let prompt = build_prompt(request);
        let raw = self.provider.complete(&prompt).await?;
        let parsed = parse_variants(&raw).inspect_err(|e| {
            tracing::warn!(
                provider = self.provider.name(),
                error = %e,
                raw_chars = raw.len(),
                "model output rejected"
            );
        })?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::CollaboratorError;
    use std::sync::Mutex;

    struct Scripted {
        answer: Result<String, CollaboratorError>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone()
        }
    }

    fn generator(answer: Result<String, CollaboratorError>) -> LlmCaptionGenerator<Scripted> {
        LlmCaptionGenerator::new(Scripted {
            answer,
            prompts: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn valid_answer_becomes_variants() {
        let g = generator(Ok(r##"```json
{"variants":[{"id":"v1","caption":"Hit the track!","hashtags":["#racing","#arcade"]}]}
```"##
            .into()));
        let request = GenerationRequest {
            critique: Some("trend fit too low".into()),
            ..GenerationRequest::default()
        };
        let parsed = g.generate(&request).await.unwrap();
        assert_eq!(parsed.as_slice()[0].id.as_str(), "v1");
        assert!(g.provider.prompts.lock().unwrap()[0].contains("trend fit too low"));
    }

    #[tokio::test]
    async fn garbage_answer_is_a_parse_failure() {
        let g = generator(Ok("Sorry, I can't do that.".into()));
        let err = g.generate(&GenerationRequest::default()).await.unwrap_err();
        assert!(matches!(err, GenerationError::ParseValidation(_)));
    }

    #[tokio::test]
    async fn provider_errors_pass_through() {
        let g = generator(Err(CollaboratorError::Timeout {
            collaborator: "scripted".into(),
            after: std::time::Duration::from_secs(1),
        }));
        let err = g.generate(&GenerationRequest::default()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Collaborator(ref e) if e.is_timeout()));
    }
}
