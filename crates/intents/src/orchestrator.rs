//! Contextual-command orchestrator (§4.5, §4.6).
//!
//! Ported from the original's `IntentOrchestrator._resolve_contextual_command_internal`: when an
//! intent arrives addressed to the pseudo-domain `contextual` (e.g. "stop" with no named target),
//! score every domain with a currently active action and either dispatch to the winner or ask the
//! user to disambiguate.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use voice_core::error::ErrorKind;
use voice_core::traits::IntentHandler;
use voice_core::{ActiveAction, Intent, IntentResult, UnifiedConversationContext, CONTEXTUAL_DOMAIN};

use crate::registry::IntentRegistry;

const PRIORITY_CAP: f64 = 100.0;
const RECENCY_CAP: f64 = 50.0;
const MULTIPLICITY_PER_ACTION: f64 = 5.0;
const MULTIPLICITY_CAP: f64 = 20.0;
const TIE_THRESHOLD: f64 = 10.0;
const CONFIDENCE_DIVISOR: f64 = 150.0;
const MIN_DOMAINS_FOR_FORCED_CONFIRMATION: usize = 3;

/// An ordered, declarative transform applied to every intent before dispatch (§4.5 step 1).
/// Failures are logged by the caller and otherwise ignored — middleware never aborts the pipeline.
pub trait IntentMiddleware: Send + Sync {
    fn apply(&self, intent: Intent, context: &UnifiedConversationContext) -> Result<Intent, String>;
}

/// Per-domain scoring used for contextual resolution, exposed for diagnostics/tests.
#[derive(Debug, Clone)]
pub struct ScoredDomains {
    pub scores: HashMap<String, f64>,
    pub winner: String,
    pub tied: Vec<String>,
}

fn score_domain(
    domain: &str,
    actions: &[(&String, &ActiveAction)],
    domain_priorities: &HashMap<String, i32>,
    now: chrono::DateTime<Utc>,
) -> f64 {
    let priority = domain_priorities.get(domain).copied().unwrap_or(0) as f64;
    let priority_score = priority.min(PRIORITY_CAP);

    let most_recent = actions.iter().map(|(_, a)| a.started_at).max();
    let recency_score = match most_recent {
        Some(started_at) => {
            let age_minutes = (now - started_at).num_seconds() as f64 / 60.0;
            (RECENCY_CAP - age_minutes).max(0.0)
        }
        None => 0.0,
    };

    let multiplicity_score = (actions.len() as f64 * MULTIPLICITY_PER_ACTION).min(MULTIPLICITY_CAP);

    priority_score + recency_score + multiplicity_score
}

/// Score every domain with an active action capable of handling `action`, per §4.5.2c/d.
pub fn score_candidate_domains(
    context: &UnifiedConversationContext,
    capable_domains: &[String],
    domain_priorities: &HashMap<String, i32>,
) -> Option<ScoredDomains> {
    let now = Utc::now();
    let mut scores = HashMap::new();

    for domain in capable_domains {
        let actions = context.active_actions_in_domain(domain);
        if actions.is_empty() {
            continue;
        }
        scores.insert(domain.clone(), score_domain(domain, &actions, domain_priorities, now));
    }

    if scores.is_empty() {
        return None;
    }

    let top_score = scores.values().cloned().fold(f64::MIN, f64::max);
    let winner = scores
        .iter()
        .find(|(_, &s)| s == top_score)
        .map(|(d, _)| d.clone())
        .expect("scores is non-empty");
    let tied: Vec<String> = scores
        .iter()
        .filter(|(_, &s)| (top_score - s).abs() <= TIE_THRESHOLD)
        .map(|(d, _)| d.clone())
        .collect();

    Some(ScoredDomains { scores, winner, tied })
}

/// Outcome of contextual resolution: either a rewritten intent ready for dispatch, or a result
/// that should be returned to the caller directly (failure or confirmation prompt).
pub enum ContextualResolution {
    Resolved(Intent),
    Result(IntentResult),
}

/// Resolve a `contextual.<action>` intent against the session's active actions (§4.5 step 2).
pub fn resolve_contextual_intent(
    intent: &Intent,
    context: &UnifiedConversationContext,
    registry: &IntentRegistry,
    domain_priorities: &HashMap<String, i32>,
    destructive_actions: &[String],
) -> ContextualResolution {
    debug_assert_eq!(intent.domain, CONTEXTUAL_DOMAIN);

    if context.active_actions().is_empty() {
        return ContextualResolution::Result(IntentResult::failure(
            ErrorKind::NoActiveActions.as_str(),
            "nothing is currently running",
        ));
    }

    let capable_handlers = registry.handlers_supporting_contextual_command(&intent.action);
    let capable_domains: Vec<String> = capable_handlers
        .iter()
        .flat_map(|h| h.patterns().iter().map(|p| p.domain.clone()))
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();

    if capable_domains.is_empty() {
        return ContextualResolution::Result(IntentResult::failure(
            ErrorKind::NoCapableHandlers.as_str(),
            format!("no running action supports '{}'", intent.action),
        ));
    }

    let Some(scored) = score_candidate_domains(context, &capable_domains, domain_priorities) else {
        return ContextualResolution::Result(IntentResult::failure(
            ErrorKind::NoActiveActions.as_str(),
            "nothing is currently running",
        ));
    };

    let is_destructive = destructive_actions.iter().any(|a| a == &intent.action);
    let forced_confirmation = scored.tied.len() > 1
        && (is_destructive || scored.tied.len() >= MIN_DOMAINS_FOR_FORCED_CONFIRMATION);

    if forced_confirmation {
        let mut domains = scored.tied.clone();
        domains.sort();
        let prompt = format!(
            "did you mean to {} {}? ({})",
            intent.action,
            domains.join(" or "),
            domains.join(", ")
        );
        return ContextualResolution::Result(
            IntentResult::requires_confirmation(prompt).with_metadata(
                "candidate_domains",
                serde_json::to_value(&domains).unwrap_or_default(),
            ),
        );
    }

    let top_total = scored.scores[&scored.winner];
    let confidence = (top_total / CONFIDENCE_DIVISOR).min(1.0) as f32;
    let resolved = intent.resolved_to(scored.winner.clone(), "priority_recency_multiplicity", confidence);

    ContextualResolution::Resolved(resolved)
}

/// Runs middleware, contextual resolution, registry lookup, and handler dispatch for one intent.
pub struct Orchestrator {
    registry: Arc<IntentRegistry>,
    domain_priorities: HashMap<String, i32>,
    destructive_actions: Vec<String>,
    middleware: Vec<Box<dyn IntentMiddleware>>,
}

impl Orchestrator {
    pub fn new(registry: Arc<IntentRegistry>, domain_priorities: HashMap<String, i32>, destructive_actions: Vec<String>) -> Self {
        Self {
            registry,
            domain_priorities,
            destructive_actions,
            middleware: Vec::new(),
        }
    }

    pub fn add_middleware(&mut self, middleware: Box<dyn IntentMiddleware>) {
        self.middleware.push(middleware);
    }

    /// The full dispatch pipeline from §4.5 "Orchestrator — execution pipeline", steps 1-6.
    /// Step 7 (exception -> error-handler match) is the caller's responsibility: handler
    /// execution here never panics across this boundary, it returns an `IntentResult::failure`.
    pub async fn dispatch(&self, intent: Intent, context: &mut UnifiedConversationContext) -> IntentResult {
        let mut intent = intent;
        for mw in &self.middleware {
            match mw.apply(intent.clone(), context) {
                Ok(rewritten) => intent = rewritten,
                Err(err) => {
                    tracing::warn!(error = %err, "intent middleware failed, continuing with unmodified intent");
                }
            }
        }

        if intent.is_contextual() {
            match resolve_contextual_intent(
                &intent,
                context,
                &self.registry,
                &self.domain_priorities,
                &self.destructive_actions,
            ) {
                ContextualResolution::Result(result) => return result,
                ContextualResolution::Resolved(resolved) => intent = resolved,
            }
        }

        let Some(handler) = self.registry.resolve(&intent) else {
            return IntentResult::failure(ErrorKind::NoHandler.as_str(), format!("no handler for '{}'", intent.name()));
        };

        if !handler.can_handle(&intent).await {
            return IntentResult::failure(
                ErrorKind::HandlerUnavailable.as_str(),
                format!("'{}' cannot currently handle this intent", handler.name()),
            );
        }

        context.push_turn(voice_core::context::TurnRole::User, intent.raw_text.clone());

        // §4.5 step 4: prefer donation-routed execution when the handler advertises support for
        // it *and* its donation actually names the method being invoked; fall back to `execute`.
        let donated_method = handler
            .donation()
            .filter(|_| handler.supports_donation_routing())
            .and_then(|donation| donation.method(&intent.action));

        let result = if donated_method.is_some() {
            handler.execute_with_donation_routing(&intent, context).await
        } else {
            handler.execute(&intent, context).await
        };
        context.push_turn(voice_core::context::TurnRole::Assistant, result.text.clone());

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use voice_core::traits::IntentPattern;

    struct StubHandler {
        domain: &'static str,
        patterns: Vec<IntentPattern>,
    }

    #[async_trait]
    impl IntentHandler for StubHandler {
        fn name(&self) -> &str {
            self.domain
        }

        fn patterns(&self) -> &[IntentPattern] {
            &self.patterns
        }

        async fn execute(&self, intent: &Intent, _context: &mut UnifiedConversationContext) -> IntentResult {
            IntentResult::success(format!("handled by {}", intent.domain))
        }
    }

    fn registry_with_two_domains() -> IntentRegistry {
        let mut registry = IntentRegistry::new();
        registry.register_handler(Arc::new(StubHandler {
            domain: "audio",
            patterns: vec![IntentPattern::new("audio", "*")],
        }));
        registry.register_handler(Arc::new(StubHandler {
            domain: "timer",
            patterns: vec![IntentPattern::new("timer", "*")],
        }));
        registry
    }

    #[test]
    fn single_active_domain_wins_outright() {
        let mut context = UnifiedConversationContext::new("s1");
        context.register_active_action("play_music", "audio", "audio_handler");
        let registry = registry_with_two_domains();
        let priorities = HashMap::new();

        let intent = Intent::new(CONTEXTUAL_DOMAIN, "stop", "stop", "s1", 0.9);
        match resolve_contextual_intent(&intent, &context, &registry, &priorities, &[]) {
            ContextualResolution::Resolved(resolved) => assert_eq!(resolved.domain, "audio"),
            ContextualResolution::Result(_) => panic!("expected resolution"),
        }
    }

    #[test]
    fn no_active_actions_fails_immediately() {
        let context = UnifiedConversationContext::new("s1");
        let registry = registry_with_two_domains();
        let intent = Intent::new(CONTEXTUAL_DOMAIN, "stop", "stop", "s1", 0.9);
        match resolve_contextual_intent(&intent, &context, &registry, &HashMap::new(), &[]) {
            ContextualResolution::Result(r) => assert_eq!(r.error.as_deref(), Some(ErrorKind::NoActiveActions.as_str())),
            ContextualResolution::Resolved(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn destructive_command_with_tied_domains_forces_confirmation() {
        let mut context = UnifiedConversationContext::new("s1");
        context.register_active_action("play_music", "audio", "audio_handler");
        context.register_active_action("set_timer", "timer", "timer_handler");
        let registry = registry_with_two_domains();
        let priorities = HashMap::new();

        let intent = Intent::new(CONTEXTUAL_DOMAIN, "cancel", "cancel", "s1", 0.9);
        match resolve_contextual_intent(&intent, &context, &registry, &priorities, &["cancel".to_string()]) {
            ContextualResolution::Result(r) => assert!(r.requires_disambiguation()),
            ContextualResolution::Resolved(_) => panic!("expected a confirmation prompt"),
        }
    }

    #[test]
    fn non_destructive_command_with_two_tied_domains_picks_by_recency() {
        let mut context = UnifiedConversationContext::new("s1");
        context.register_active_action("play_music", "audio", "audio_handler");
        context.register_active_action("set_timer", "timer", "timer_handler");
        let registry = registry_with_two_domains();
        let mut priorities = HashMap::new();
        priorities.insert("audio".to_string(), 60);
        priorities.insert("timer".to_string(), 10);

        let intent = Intent::new(CONTEXTUAL_DOMAIN, "pause", "pause", "s1", 0.9);
        match resolve_contextual_intent(&intent, &context, &registry, &priorities, &[]) {
            ContextualResolution::Resolved(resolved) => assert_eq!(resolved.domain, "audio"),
            ContextualResolution::Result(_) => panic!("priority gap exceeds tie threshold, should resolve outright"),
        }
    }

    #[tokio::test]
    async fn dispatch_executes_resolved_handler_and_updates_history() {
        let registry = Arc::new(registry_with_two_domains());
        let orchestrator = Orchestrator::new(registry, HashMap::new(), vec![]);
        let mut context = UnifiedConversationContext::new("s1");

        let intent = Intent::new("audio", "play", "play some music", "s1", 0.9);
        let result = orchestrator.dispatch(intent, &mut context).await;
        assert!(result.success);
        assert_eq!(context.history().len(), 2);
    }

    #[tokio::test]
    async fn dispatch_fails_with_no_handler_for_unknown_domain() {
        let registry = Arc::new(IntentRegistry::new());
        let orchestrator = Orchestrator::new(registry, HashMap::new(), vec![]);
        let mut context = UnifiedConversationContext::new("s1");

        let intent = Intent::new("unknown", "action", "text", "s1", 0.9);
        let result = orchestrator.dispatch(intent, &mut context).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(ErrorKind::NoHandler.as_str()));
    }
}
