//! `UnifiedConversationContext` — per-session mutable conversation state (§3, §4.6).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// One turn of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
    User,
    Assistant,
}

/// A fire-and-forget action currently running on behalf of a session (§4.3, §4.5, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveAction {
    pub domain: String,
    pub handler: String,
    pub started_at: DateTime<Utc>,
}

/// Disambiguation context stored after a `requires_confirmation` contextual resolution, so the
/// next turn's reply (e.g. "the music") can be matched against it. Expires after 5 minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisambiguationContext {
    pub candidate_domains: Vec<String>,
    pub action: String,
    pub stored_at: DateTime<Utc>,
}

impl DisambiguationContext {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: ChronoDuration) -> bool {
        now - self.stored_at > ttl
    }
}

pub const DISAMBIGUATION_TTL_SECS: i64 = 300;
const DEFAULT_MAX_HISTORY_TURNS: usize = 20;
const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 1800;

/// Per-session conversation state. Every mutation bumps `last_updated`; the context manager
/// (§4.6) is responsible for TTL-based garbage collection and is the only thing that constructs
/// one of these directly via `new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedConversationContext {
    pub session_id: String,
    pub client_id: Option<String>,
    pub room_id: Option<String>,
    pub language: String,
    history: VecDeque<Turn>,
    max_history_turns: usize,
    active_actions: HashMap<String, ActiveAction>,
    pub metadata: HashMap<String, Value>,
    disambiguation_context: Option<DisambiguationContext>,
    pub user_preferences: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl UnifiedConversationContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            client_id: None,
            room_id: None,
            language: "ru".to_string(),
            history: VecDeque::new(),
            max_history_turns: DEFAULT_MAX_HISTORY_TURNS,
            active_actions: HashMap::new(),
            metadata: HashMap::new(),
            disambiguation_context: None,
            user_preferences: HashMap::new(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn with_max_history_turns(mut self, max: usize) -> Self {
        self.max_history_turns = max.max(1);
        self
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Append a turn, evicting the oldest if the ring buffer is at capacity (invariant:
    /// `history.len() <= max_history_turns` always holds, even mid-push).
    pub fn push_turn(&mut self, role: TurnRole, text: impl Into<String>) {
        if self.history.len() >= self.max_history_turns {
            self.history.pop_front();
        }
        self.history.push_back(Turn {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        });
        self.touch();
    }

    pub fn history(&self) -> &VecDeque<Turn> {
        &self.history
    }

    pub fn max_history_turns(&self) -> usize {
        self.max_history_turns
    }

    pub fn register_active_action(
        &mut self,
        action_name: impl Into<String>,
        domain: impl Into<String>,
        handler: impl Into<String>,
    ) {
        self.active_actions.insert(
            action_name.into(),
            ActiveAction {
                domain: domain.into(),
                handler: handler.into(),
                started_at: Utc::now(),
            },
        );
        self.touch();
    }

    pub fn complete_active_action(&mut self, action_name: &str) -> Option<ActiveAction> {
        let removed = self.active_actions.remove(action_name);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    pub fn active_actions(&self) -> &HashMap<String, ActiveAction> {
        &self.active_actions
    }

    pub fn active_actions_in_domain(&self, domain: &str) -> Vec<(&String, &ActiveAction)> {
        self.active_actions
            .iter()
            .filter(|(_, a)| a.domain == domain)
            .collect()
    }

    pub fn store_disambiguation_context(
        &mut self,
        candidate_domains: Vec<String>,
        action: impl Into<String>,
    ) {
        self.disambiguation_context = Some(DisambiguationContext {
            candidate_domains,
            action: action.into(),
            stored_at: Utc::now(),
        });
        self.touch();
    }

    /// Returns the stored disambiguation context only if it has not expired; an expired entry is
    /// treated as absent (but not proactively cleared — `clear_disambiguation_context` or the
    /// next `store` call is responsible for that).
    pub fn get_disambiguation_context(&self) -> Option<&DisambiguationContext> {
        self.disambiguation_context.as_ref().filter(|ctx| {
            !ctx.is_expired(Utc::now(), ChronoDuration::seconds(DISAMBIGUATION_TTL_SECS))
        })
    }

    pub fn clear_disambiguation_context(&mut self) {
        self.disambiguation_context = None;
        self.touch();
    }

    pub fn update_language_preference(&mut self, language: impl Into<String>) {
        let language = language.into();
        self.user_preferences
            .insert("language".to_string(), Value::String(language.clone()));
        self.language = language;
        self.touch();
    }

    pub fn is_idle_longer_than(&self, now: DateTime<Utc>, timeout_secs: i64) -> bool {
        now - self.last_updated > ChronoDuration::seconds(timeout_secs)
    }
}

pub fn default_session_timeout_secs() -> i64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_never_exceeds_max_turns() {
        let mut ctx = UnifiedConversationContext::new("s1").with_max_history_turns(2);
        ctx.push_turn(TurnRole::User, "one");
        ctx.push_turn(TurnRole::Assistant, "two");
        ctx.push_turn(TurnRole::User, "three");
        assert_eq!(ctx.history().len(), 2);
        assert_eq!(ctx.history()[0].text, "two");
    }

    #[test]
    fn active_action_lifecycle() {
        let mut ctx = UnifiedConversationContext::new("s1");
        ctx.register_active_action("play_music", "audio", "audio_handler");
        assert_eq!(ctx.active_actions().len(), 1);
        let removed = ctx.complete_active_action("play_music");
        assert!(removed.is_some());
        assert!(ctx.active_actions().is_empty());
    }

    #[test]
    fn disambiguation_context_expires() {
        let mut ctx = UnifiedConversationContext::new("s1");
        ctx.store_disambiguation_context(vec!["audio".into(), "timer".into()], "stop");
        assert!(ctx.get_disambiguation_context().is_some());
        // Simulate expiry by writing directly (only reachable from within the crate in tests).
        ctx.disambiguation_context.as_mut().unwrap().stored_at =
            Utc::now() - ChronoDuration::seconds(DISAMBIGUATION_TTL_SECS + 1);
        assert!(ctx.get_disambiguation_context().is_none());
    }
}
