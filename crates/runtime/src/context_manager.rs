//! Session context manager (§4.6).
//!
//! Owns every session's `UnifiedConversationContext`, keyed by session id. A context is created
//! lazily on first access with `language="ru"` (the core's default) and a `session_start` turn
//! recorded in its metadata; a background task periodically sweeps contexts idle longer than
//! `session_timeout` and records `session_end` before dropping them. Grounded on the `TimerManager`
//! idiom next door: a detached `tokio::task` owns the sweep loop, `JoinHandle::abort` on `Drop`
//! guarantees it stops with the manager rather than outliving it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use voice_core::context::UnifiedConversationContext;
use voice_core_config::ContextConfig;

const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 1800;
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-session conversation context store with idle-timeout garbage collection.
///
/// Cloning is cheap: the map and sweep handle are shared via `Arc`, so the manager can be handed
/// to every workflow stage that needs session context without wrapping it in another `Arc` itself.
#[derive(Clone)]
pub struct ContextManager {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: Arc<DashMap<String, UnifiedConversationContext>>,
    session_timeout_secs: i64,
    sweeper: JoinHandle<()>,
}

impl ContextManager {
    /// Start the manager with the default 1800s session timeout and a 60s sweep interval.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_SESSION_TIMEOUT_SECS, DEFAULT_CLEANUP_INTERVAL)
    }

    /// Start the manager from `[context]` settings (§4.9), sweeping at a tenth of the configured
    /// timeout so a session is never more than ~10% past due before being reaped.
    pub fn from_config(config: &ContextConfig) -> Self {
        let sweep_interval = Duration::from_secs((config.session_timeout_secs.max(10) / 10) as u64);
        Self::with_config(config.session_timeout_secs, sweep_interval)
    }

    pub fn with_config(session_timeout_secs: i64, cleanup_interval: Duration) -> Self {
        let sessions: Arc<DashMap<String, UnifiedConversationContext>> = Arc::new(DashMap::new());
        let sweeper = {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(cleanup_interval);
                loop {
                    ticker.tick().await;
                    sweep_idle_sessions(&sessions, session_timeout_secs);
                }
            })
        };

        Self { inner: Arc::new(Inner { sessions, session_timeout_secs, sweeper }) }
    }

    /// Fetch or lazily create the context for `session_id`, recording `session_start` the first
    /// time it's seen.
    pub fn get_or_create(&self, session_id: &str) -> UnifiedConversationContext {
        if let Some(existing) = self.inner.sessions.get(session_id) {
            return existing.clone();
        }
        let mut context = UnifiedConversationContext::new(session_id);
        context
            .metadata
            .insert("session_start".to_string(), serde_json::Value::String(now_rfc3339()));
        info!(session_id, "session started");
        self.inner.sessions.insert(session_id.to_string(), context.clone());
        context
    }

    /// Persist a context mutated by a caller (the workflow engine owns the read-modify-write
    /// cycle; this just writes the result back).
    pub fn save(&self, context: UnifiedConversationContext) {
        self.inner.sessions.insert(context.session_id.clone(), context);
    }

    /// Remove a session immediately, recording `session_end`. Used by explicit "end session"
    /// intents as well as the idle sweep.
    pub fn clear_session(&self, session_id: &str) -> bool {
        let removed = self.inner.sessions.remove(session_id);
        if removed.is_some() {
            info!(session_id, "session ended");
        }
        removed.is_some()
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn session_timeout_secs(&self) -> i64 {
        self.inner.session_timeout_secs
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

fn sweep_idle_sessions(sessions: &DashMap<String, UnifiedConversationContext>, timeout_secs: i64) {
    let now = chrono::Utc::now();
    let expired: Vec<String> = sessions
        .iter()
        .filter(|entry| entry.value().is_idle_longer_than(now, timeout_secs))
        .map(|entry| entry.key().clone())
        .collect();

    for session_id in expired {
        sessions.remove(&session_id);
        debug!(session_id, "session expired, removed by sweep");
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let manager = ContextManager::new();
        let first = manager.get_or_create("s1");
        let second = manager.get_or_create("s1");
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn clear_session_removes_it() {
        let manager = ContextManager::new();
        manager.get_or_create("s1");
        assert!(manager.clear_session("s1"));
        assert_eq!(manager.session_count(), 0);
        assert!(!manager.clear_session("s1"));
    }

    #[tokio::test]
    async fn idle_sessions_are_swept() {
        let manager = ContextManager::with_config(0, Duration::from_millis(20));
        manager.get_or_create("s1");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn save_persists_mutations() {
        let manager = ContextManager::new();
        let mut ctx = manager.get_or_create("s1");
        ctx.update_language_preference("en");
        manager.save(ctx);
        let reloaded = manager.get_or_create("s1");
        assert_eq!(reloaded.language, "en");
    }
}
