//! Intent and intent-result types (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A pseudo-domain marking a command whose target must be resolved against currently active
/// actions rather than dispatched directly (e.g. `contextual.stop`).
pub const CONTEXTUAL_DOMAIN: &str = "contextual";

/// A recognized natural-language intent. Immutable once constructed: the orchestrator never
/// edits an `Intent` in place, it produces a new one (e.g. when rewriting a contextual command
/// to its resolved domain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub domain: String,
    pub action: String,
    pub entities: HashMap<String, Value>,
    pub confidence: f32,
    pub raw_text: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Intent {
    pub fn new(
        domain: impl Into<String>,
        action: impl Into<String>,
        raw_text: impl Into<String>,
        session_id: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            domain: domain.into(),
            action: action.into(),
            entities: HashMap::new(),
            confidence: confidence.clamp(0.0, 1.0),
            raw_text: raw_text.into(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// `"domain.action"`, the canonical intent name used for registry lookup.
    pub fn name(&self) -> String {
        format!("{}.{}", self.domain, self.action)
    }

    pub fn is_contextual(&self) -> bool {
        self.domain == CONTEXTUAL_DOMAIN
    }

    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entities.insert(key.into(), value.into());
        self
    }

    /// Rewrite a contextual intent to its resolved domain, stamping resolution metadata onto
    /// entities so downstream consumers can see how the rewrite happened.
    pub fn resolved_to(&self, domain: impl Into<String>, method: &str, confidence: f32) -> Self {
        let mut resolved = self.clone();
        resolved.domain = domain.into();
        resolved
            .entities
            .insert("_contextual_resolution".to_string(), serde_json::json!({
                "method": method,
                "confidence": confidence,
            }));
        resolved
    }
}

/// The outcome of executing an intent, returned by handlers and consumed by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub text: String,
    pub should_speak: bool,
    pub success: bool,
    pub error: Option<String>,
    pub confidence: f32,
    pub metadata: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub action_metadata: Option<Value>,
}

impl IntentResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            should_speak: true,
            success: true,
            error: None,
            confidence: 1.0,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
            action_metadata: None,
        }
    }

    pub fn failure(error_kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            should_speak: false,
            success: false,
            error: Some(error_kind.into()),
            confidence: 0.0,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
            action_metadata: None,
        }
    }

    pub fn requires_confirmation(message: impl Into<String>) -> Self {
        let mut result = Self::success(message);
        result.should_speak = true;
        result
            .metadata
            .insert("requires_disambiguation".to_string(), Value::Bool(true));
        result
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn requires_disambiguation(&self) -> bool {
        matches!(
            self.metadata.get("requires_disambiguation"),
            Some(Value::Bool(true))
        )
    }
}
