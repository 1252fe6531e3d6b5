//! `LanguageModel` — the optional LLM enrichment stage (§4.3).
//!
//! Deliberately thin next to the teacher's `LanguageModel`: no tool/function calling, no
//! streaming-to-TTS plumbing. This core's non-goals exclude a persona-specific conversational
//! backend, so the only thing the pipeline asks of an LLM is "take this result text and make it
//! better," best-effort.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("language model unavailable: {0}")]
    Unavailable(String),
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

/// Enrichment backend consulted after intent execution, before TTS. A failure here is
/// best-effort (§4.3 "Failure semantics"): the pipeline falls back to the handler's own text.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    async fn enrich(&self, text: &str, session_id: &str) -> Result<String, LlmError>;

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn enrich(&self, text: &str, _session_id: &str) -> Result<String, LlmError> {
            Ok(format!("{text}!"))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn enrichment_appends_emphasis() {
        let model = EchoModel;
        assert_eq!(model.enrich("hi", "s1").await.unwrap(), "hi!");
        assert!(model.is_available().await);
    }
}
