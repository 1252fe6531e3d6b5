//! `timer.set` / `timer.stop` — a concrete handler backed by `voice-core-runtime`'s async timer
//! manager (§4.8). Grounded on the original's timer intent shape: a duration entity in seconds,
//! one active timer per session, fire-and-forget tracked via `active_actions`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use voice_core::donation::{Donation, MethodDonation, ParameterSpec, ParameterType};
use voice_core::traits::{IntentHandler, IntentPattern};
use voice_core::{Intent, IntentResult, UnifiedConversationContext};
use voice_core_runtime::{ContextManager, TimerManager};

const ACTION_NAME: &str = "active_timer";

pub struct TimerHandler {
    manager: Arc<Mutex<TimerManager>>,
    context_manager: ContextManager,
    patterns: Vec<IntentPattern>,
    donation: Donation,
}

impl TimerHandler {
    /// `context_manager` is injected so a timer's detached expiry task can still clear the
    /// session's active-action record after `execute` has long since returned (§4.1's
    /// "fire-and-forget tracking").
    pub fn new(manager: Arc<Mutex<TimerManager>>, context_manager: ContextManager) -> Self {
        Self {
            manager,
            context_manager,
            patterns: vec![IntentPattern::new("timer", "set"), IntentPattern::new("timer", "stop")],
            donation: Donation {
                handler_domain: "timer".to_string(),
                method_donations: vec![
                    MethodDonation {
                        method_name: "set".to_string(),
                        intent_suffix: "set".to_string(),
                        phrases: vec!["set a timer for {duration}".to_string(), "timer for {duration}".to_string()],
                        parameters: vec![ParameterSpec {
                            name: "duration_seconds".to_string(),
                            param_type: ParameterType::Duration,
                            choices: Vec::new(),
                            required: true,
                        }],
                        examples: Vec::new(),
                    },
                    MethodDonation {
                        method_name: "stop".to_string(),
                        intent_suffix: "stop".to_string(),
                        phrases: vec!["stop the timer".to_string(), "cancel the timer".to_string()],
                        parameters: Vec::new(),
                        examples: Vec::new(),
                    },
                ],
                intent_name_patterns: vec!["timer.*".to_string()],
            },
        }
    }

    fn requested_duration(intent: &Intent) -> Option<Duration> {
        intent
            .entities
            .get("duration_seconds")
            .and_then(|v| v.as_f64())
            .filter(|secs| *secs > 0.0)
            .map(Duration::from_secs_f64)
    }
}

#[async_trait]
impl IntentHandler for TimerHandler {
    fn name(&self) -> &str {
        "timer"
    }

    fn patterns(&self) -> &[IntentPattern] {
        &self.patterns
    }

    fn is_destructive(&self, action: &str) -> bool {
        action == "stop"
    }

    fn donation(&self) -> Option<&Donation> {
        Some(&self.donation)
    }

    fn supports_donation_routing(&self) -> bool {
        true
    }

    async fn execute(&self, intent: &Intent, context: &mut UnifiedConversationContext) -> IntentResult {
        match intent.action.as_str() {
            "set" => {
                let Some(duration) = Self::requested_duration(intent) else {
                    return IntentResult::failure(
                        "invalid_parameters",
                        "tell me how long the timer should run",
                    );
                };

                let timer_id = intent.session_id.clone();
                let context_manager = self.context_manager.clone();
                let expired_session = timer_id.clone();
                let mut manager = self.manager.lock().await;
                let scheduled = manager.schedule(
                    "voice_timer",
                    duration,
                    Box::new(move || {
                        let context_manager = context_manager.clone();
                        let session_id = expired_session.clone();
                        Box::pin(async move {
                            let mut session_context = context_manager.get_or_create(&session_id);
                            session_context.complete_active_action(ACTION_NAME);
                            context_manager.save(session_context);
                            tracing::info!(session_id, "timer expired");
                        })
                    }),
                    Some(timer_id.clone()),
                );
                drop(manager);

                match scheduled {
                    Ok(id) => {
                        context.register_active_action(ACTION_NAME, "timer", "timer");
                        IntentResult::success(format!("timer set for {} seconds", duration.as_secs()))
                            .with_metadata("timer_id", id.into())
                    }
                    Err(err) => IntentResult::failure("timer_scheduling_failed", err.to_string()),
                }
            }
            "stop" => {
                let timer_id = intent.session_id.clone();
                let cancelled = self.manager.lock().await.cancel(&timer_id).await;
                context.complete_active_action(ACTION_NAME);

                if cancelled {
                    IntentResult::success("timer stopped")
                } else {
                    IntentResult::failure("no_active_timer", "there is no timer running")
                }
            }
            other => IntentResult::failure("unsupported_action", format!("timer does not support '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> TimerHandler {
        let mut manager = TimerManager::new();
        manager.start();
        TimerHandler::new(Arc::new(Mutex::new(manager)), ContextManager::new())
    }

    #[tokio::test]
    async fn setting_a_timer_without_duration_fails() {
        let handler = handler();
        let intent = Intent::new("timer", "set", "set a timer", "s1", 0.9);
        let mut context = UnifiedConversationContext::new("s1");

        let result = handler.execute(&intent, &mut context).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn setting_a_timer_registers_an_active_action() {
        let handler = handler();
        let intent = Intent::new("timer", "set", "set a timer for 5 minutes", "s1", 0.9)
            .with_entity("duration_seconds", 300.0.into());
        let mut context = UnifiedConversationContext::new("s1");

        let result = handler.execute(&intent, &mut context).await;
        assert!(result.success);
        assert!(context.active_actions().contains_key(ACTION_NAME));
    }

    #[tokio::test]
    async fn stopping_with_no_active_timer_fails() {
        let handler = handler();
        let intent = Intent::new("timer", "stop", "stop the timer", "s1", 0.9);
        let mut context = UnifiedConversationContext::new("s1");

        let result = handler.execute(&intent, &mut context).await;
        assert!(!result.success);
    }

    #[test]
    fn advertises_a_donation_covering_both_methods() {
        let handler = handler();
        assert!(handler.supports_donation_routing());
        let donation = handler.donation().expect("timer handler advertises a donation");
        assert!(donation.method("set").is_some());
        assert!(donation.method("stop").is_some());
        assert!(donation.method("unknown").is_none());
    }

    #[tokio::test]
    async fn donation_routed_execution_matches_plain_execution() {
        let handler = handler();
        let intent = Intent::new("timer", "set", "set a timer for 5 minutes", "s1", 0.9)
            .with_entity("duration_seconds", 300.0.into());
        let mut context = UnifiedConversationContext::new("s1");

        let result = handler.execute_with_donation_routing(&intent, &mut context).await;
        assert!(result.success);
        assert!(context.active_actions().contains_key(ACTION_NAME));
    }

    #[tokio::test]
    async fn timer_expiry_clears_the_active_action_via_context_manager() {
        let mut manager = TimerManager::new();
        manager.start();
        let context_manager = ContextManager::new();
        let handler = TimerHandler::new(Arc::new(Mutex::new(manager)), context_manager.clone());

        let intent = Intent::new("timer", "set", "set a timer for 50ms", "s1", 0.9)
            .with_entity("duration_seconds", 0.05.into());
        let mut context = UnifiedConversationContext::new("s1");
        let result = handler.execute(&intent, &mut context).await;
        assert!(result.success);
        context_manager.save(context);

        tokio::time::sleep(Duration::from_millis(200)).await;

        let session_context = context_manager.get_or_create("s1");
        assert!(!session_context.active_actions().contains_key(ACTION_NAME));
    }

    #[tokio::test]
    async fn stopping_an_active_timer_clears_it() {
        let handler = handler();
        let mut context = UnifiedConversationContext::new("s1");
        let set_intent = Intent::new("timer", "set", "set a timer", "s1", 0.9)
            .with_entity("duration_seconds", 30.0.into());
        handler.execute(&set_intent, &mut context).await;

        let stop_intent = Intent::new("timer", "stop", "stop the timer", "s1", 0.9);
        let result = handler.execute(&stop_intent, &mut context).await;

        assert!(result.success);
        assert!(!context.active_actions().contains_key(ACTION_NAME));
    }
}
