//! NLU provider coordination (§4.5 "Recognizer").
//!
//! Ported from the original's `IntentRecognizer`: holds an ordered set of providers, delegates to
//! a default, enforces a confidence floor, and falls back to `conversation.general` on provider
//! error or low confidence so the pipeline always produces *an* intent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use voice_core::traits::NluProvider;
use voice_core::{Donation, Intent, UnifiedConversationContext};

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;
const DEFAULT_FALLBACK_DOMAIN: &str = "conversation";
const DEFAULT_FALLBACK_ACTION: &str = "general";

pub struct Recognizer {
    providers: HashMap<String, Arc<dyn NluProvider>>,
    default_provider: Option<String>,
    confidence_threshold: f32,
    fallback_domain: String,
    fallback_action: String,
}

impl Default for Recognizer {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            fallback_domain: DEFAULT_FALLBACK_DOMAIN.to_string(),
            fallback_action: DEFAULT_FALLBACK_ACTION.to_string(),
        }
    }
}

impl Recognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Register a provider. The first one registered becomes the default.
    pub fn add_provider(&mut self, name: impl Into<String>, provider: Arc<dyn NluProvider>) {
        let name = name.into();
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        info!(provider = %name, "registered NLU provider");
        self.providers.insert(name, provider);
    }

    pub fn set_default_provider(&mut self, name: &str) -> Result<(), String> {
        if self.providers.contains_key(name) {
            self.default_provider = Some(name.to_string());
            Ok(())
        } else {
            Err(format!("NLU provider '{name}' not registered"))
        }
    }

    /// Recognize `text` into an [`Intent`], falling back to `conversation.general` when no
    /// provider is available, the provider errors, or its confidence is below threshold.
    pub async fn recognize(&self, text: &str, context: &UnifiedConversationContext) -> Intent {
        let Some(provider) = self.active_provider() else {
            warn!("no NLU providers available, using fallback");
            return self.fallback_intent(text, &context.session_id);
        };

        match provider.recognize(text, context).await {
            Ok(intent) if intent.confidence >= self.confidence_threshold => {
                info!(intent = %intent.name(), confidence = intent.confidence, "recognized intent");
                intent
            }
            Ok(intent) => {
                info!(
                    intent = %intent.name(),
                    confidence = intent.confidence,
                    threshold = self.confidence_threshold,
                    "low-confidence intent, falling back to conversation"
                );
                self.fallback_intent(text, &context.session_id)
            }
            Err(error) => {
                warn!(provider = provider.name(), %error, "NLU provider failed, using fallback");
                self.fallback_intent(text, &context.session_id)
            }
        }
    }

    fn active_provider(&self) -> Option<&Arc<dyn NluProvider>> {
        self.default_provider
            .as_ref()
            .and_then(|name| self.providers.get(name))
            .or_else(|| self.providers.values().next())
    }

    fn fallback_intent(&self, text: &str, session_id: &str) -> Intent {
        Intent::new(&self.fallback_domain, &self.fallback_action, text, session_id, 1.0)
            .with_entity("original_text", text.into())
    }

    /// Forward intent handler donations (§4.1, §4.5) to every registered provider so rule-based
    /// or trainable NLU backends can pick up trigger phrases without a redeploy.
    pub fn load_donations(&self, donations: &[Donation]) {
        if donations.is_empty() {
            return;
        }
        for provider in self.providers.values() {
            provider.load_donations(donations);
        }
        info!(providers = self.providers.len(), donations = donations.len(), "donations loaded into NLU providers");
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use voice_core::traits::ProviderError;

    fn context() -> UnifiedConversationContext {
        UnifiedConversationContext::new("s1")
    }

    struct StubProvider {
        confidence: f32,
        fails: bool,
    }

    #[async_trait]
    impl NluProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn recognize(
            &self,
            text: &str,
            context: &UnifiedConversationContext,
        ) -> Result<Intent, ProviderError> {
            if self.fails {
                return Err(ProviderError::Unavailable("stub failure".into()));
            }
            Ok(Intent::new("timer", "set", text, &context.session_id, self.confidence))
        }
    }

    #[tokio::test]
    async fn no_providers_falls_back_to_conversation_general() {
        let recognizer = Recognizer::new();
        let intent = recognizer.recognize("hello", &context()).await;
        assert_eq!(intent.domain, "conversation");
        assert_eq!(intent.action, "general");
    }

    #[tokio::test]
    async fn high_confidence_intent_passes_through() {
        let mut recognizer = Recognizer::new();
        recognizer.add_provider(
            "stub",
            Arc::new(StubProvider {
                confidence: 0.95,
                fails: false,
            }),
        );
        let intent = recognizer.recognize("set a timer", &context()).await;
        assert_eq!(intent.domain, "timer");
        assert_eq!(intent.action, "set");
    }

    #[tokio::test]
    async fn low_confidence_intent_falls_back() {
        let mut recognizer = Recognizer::new();
        recognizer.add_provider(
            "stub",
            Arc::new(StubProvider {
                confidence: 0.2,
                fails: false,
            }),
        );
        let intent = recognizer.recognize("set a timer", &context()).await;
        assert_eq!(intent.domain, "conversation");
    }

    struct DonationCountingProvider {
        loaded: Mutex<usize>,
    }

    #[async_trait]
    impl NluProvider for DonationCountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn recognize(
            &self,
            text: &str,
            context: &UnifiedConversationContext,
        ) -> Result<Intent, ProviderError> {
            Ok(Intent::new("timer", "set", text, &context.session_id, 0.9))
        }

        fn load_donations(&self, donations: &[voice_core::Donation]) {
            *self.loaded.lock().unwrap() = donations.len();
        }
    }

    #[tokio::test]
    async fn load_donations_reaches_every_registered_provider() {
        let mut recognizer = Recognizer::new();
        let provider = Arc::new(DonationCountingProvider { loaded: Mutex::new(0) });
        recognizer.add_provider("counting", provider.clone());

        let donation = voice_core::Donation {
            handler_domain: "timer".to_string(),
            method_donations: vec![],
            intent_name_patterns: vec![],
        };
        recognizer.load_donations(&[donation]);

        assert_eq!(*provider.loaded.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn provider_error_falls_back() {
        let mut recognizer = Recognizer::new();
        recognizer.add_provider(
            "stub",
            Arc::new(StubProvider {
                confidence: 0.95,
                fails: true,
            }),
        );
        let intent = recognizer.recognize("set a timer", &context()).await;
        assert_eq!(intent.domain, "conversation");
    }
}
