//! `IntentHandler` — the contract a domain plugin implements to execute recognized intents
//! (§4.5, §4.6).

use super::component::Component;
use crate::context::UnifiedConversationContext;
use crate::donation::Donation;
use crate::intent::{Intent, IntentResult};
use async_trait::async_trait;

/// One `(domain, action)` pattern a handler can execute, as registered with the registry (§4.5).
/// `action` may be `"*"` to mean "any action in this domain".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntentPattern {
    pub domain: String,
    pub action: String,
}

impl IntentPattern {
    pub fn new(domain: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            action: action.into(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.action == "*"
    }

    pub fn matches(&self, domain: &str, action: &str) -> bool {
        self.domain == domain && (self.action == action || self.is_wildcard())
    }
}

/// A domain plugin capable of executing one or more intent patterns. Implementations are
/// expected to be cheap to hold behind an `Arc` and safe to call concurrently across sessions;
/// per-session state belongs in `UnifiedConversationContext`, not in the handler itself.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    /// Stable name, used in diagnostics and in `ActiveAction::handler`.
    fn name(&self) -> &str;

    /// Patterns this handler claims, in priority order (highest first) for tie-breaking against
    /// other handlers claiming the same domain (§4.5).
    fn patterns(&self) -> &[IntentPattern];

    /// Relative priority used by the orchestrator's scoring formula (§4.6) when more than one
    /// handler could plausibly take a contextual command. Higher wins, ties broken by recency.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether this handler's actions should force a confirmation prompt before contextual
    /// dispatch (the "destructive command" rule, §4.6) — e.g. `alarm.cancel_all`.
    fn is_destructive(&self, _action: &str) -> bool {
        false
    }

    async fn can_handle(&self, intent: &Intent) -> bool {
        self.patterns().iter().any(|p| p.matches(&intent.domain, &intent.action))
    }

    /// This handler's donation manifest, if it publishes one (§4.5, §6). `None` by default —
    /// most handlers dispatch purely through `execute` and never need one.
    fn donation(&self) -> Option<&Donation> {
        None
    }

    /// Whether `execute_with_donation_routing` is meaningfully different from `execute` for this
    /// handler. The orchestrator only prefers the donation-routed path when this is `true` *and*
    /// `donation()` actually names the method being invoked (§4.5 step 4).
    fn supports_donation_routing(&self) -> bool {
        false
    }

    /// Framework components this handler needs injected, by registry name, resolved by the
    /// component manager's post-initialization coordination pass (§4.1). Empty by default.
    fn component_dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Receive a resolved dependency declared via `component_dependencies`. Default no-op;
    /// handlers that override `component_dependencies` should override this too to stash what
    /// they need (typically by downcasting `component` to a concrete type they know about).
    fn inject_component(&self, _name: &str, _component: &dyn Component) {}

    async fn execute(
        &self,
        intent: &Intent,
        context: &mut UnifiedConversationContext,
    ) -> IntentResult;

    /// Execute via the donation-described method rather than generic pattern dispatch. The
    /// default simply forwards to `execute`; handlers that override `supports_donation_routing`
    /// to return `true` should override this too to resolve `intent.action` against their
    /// `donation()`'s `method_donations` before running.
    async fn execute_with_donation_routing(
        &self,
        intent: &Intent,
        context: &mut UnifiedConversationContext,
    ) -> IntentResult {
        self.execute(intent, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_pattern_matches_any_action_in_domain() {
        let p = IntentPattern::new("audio", "*");
        assert!(p.matches("audio", "play"));
        assert!(p.matches("audio", "stop"));
        assert!(!p.matches("timer", "play"));
    }

    #[test]
    fn exact_pattern_matches_only_its_action() {
        let p = IntentPattern::new("timer", "set");
        assert!(p.matches("timer", "set"));
        assert!(!p.matches("timer", "stop"));
    }
}
