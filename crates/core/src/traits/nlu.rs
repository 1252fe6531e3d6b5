//! Natural-language-understanding provider interface (§4.5 "Recognizer").

use async_trait::async_trait;

use crate::context::UnifiedConversationContext;
use crate::donation::Donation;
use crate::intent::Intent;

use super::speech::ProviderError;

/// A single NLU backend capable of turning free text into a candidate [`Intent`].
///
/// The recognizer in `voice-core-intents` holds an ordered set of these, delegates to a
/// default, and falls back to `conversation.general` on error or low confidence.
#[async_trait]
pub trait NluProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(
        &self,
        text: &str,
        context: &UnifiedConversationContext,
    ) -> Result<Intent, ProviderError>;

    async fn is_available(&self) -> bool {
        true
    }

    /// Load intent handler donations gathered during post-initialization coordination (§4.1) so
    /// a trainable or rule-based provider can pick up trigger phrases without a redeploy. Default
    /// no-op: most providers (e.g. a fixed-grammar one) have nothing to do with them.
    fn load_donations(&self, _donations: &[Donation]) {}
}
