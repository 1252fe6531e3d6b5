//! `conversation.general` — the NLU recognizer's universal fallback (§4.5 "Recognizer", §8).

use async_trait::async_trait;

use voice_core::traits::{IntentHandler, IntentPattern};
use voice_core::{Intent, IntentResult, UnifiedConversationContext};

/// Handles whatever the recognizer couldn't confidently classify. Deliberately thin: this core's
/// non-goals exclude a real conversational/LLM backend, so it echoes an acknowledgement rather
/// than attempting to actually converse.
pub struct ConversationHandler {
    patterns: Vec<IntentPattern>,
}

impl Default for ConversationHandler {
    fn default() -> Self {
        Self {
            patterns: vec![IntentPattern::new("conversation", "general")],
        }
    }
}

impl ConversationHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentHandler for ConversationHandler {
    fn name(&self) -> &str {
        "conversation"
    }

    fn patterns(&self) -> &[IntentPattern] {
        &self.patterns
    }

    async fn execute(&self, intent: &Intent, _context: &mut UnifiedConversationContext) -> IntentResult {
        let heard = intent
            .entities
            .get("original_text")
            .and_then(|v| v.as_str())
            .unwrap_or(intent.raw_text.as_str());

        IntentResult::success(format!("I heard you say: {heard}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_the_original_text_entity() {
        let handler = ConversationHandler::new();
        let intent = Intent::new("conversation", "general", "what's the weather", "s1", 1.0)
            .with_entity("original_text", "what's the weather".into());
        let mut context = UnifiedConversationContext::new("s1");

        let result = handler.execute(&intent, &mut context).await;
        assert!(result.text.contains("what's the weather"));
        assert!(result.success);
    }
}
