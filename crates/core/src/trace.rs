//! `TraceContext` — optional per-request stage recording (§3, §4.3).
//!
//! Distinct from `tracing`'s spans: this is a user-facing recording returned to API callers
//! (`TraceCommandResponse`, §6), capped in size so a misbehaving stage cannot balloon a response
//! body, and is opt-in per request rather than always-on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

const DEFAULT_MAX_STAGES: usize = 32;
const DEFAULT_MAX_DATA_SIZE_MB: usize = 4;
const ELIDED_SENTINEL: &str = "<elided: payload exceeds trace size cap>";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTrace {
    pub stage: String,
    pub input: Value,
    pub output: Value,
    pub metadata: Value,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    pub request_id: String,
    stages: Vec<StageTrace>,
    max_stages: usize,
    max_data_size_bytes: usize,
    pub context_before: Option<Value>,
    pub context_after: Option<Value>,
    overflowed: bool,
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            stages: Vec::new(),
            max_stages: DEFAULT_MAX_STAGES,
            max_data_size_bytes: DEFAULT_MAX_DATA_SIZE_MB * 1024 * 1024,
            context_before: None,
            context_after: None,
            overflowed: false,
        }
    }

    pub fn with_caps(mut self, max_stages: usize, max_data_size_mb: usize) -> Self {
        self.max_stages = max_stages;
        self.max_data_size_bytes = max_data_size_mb * 1024 * 1024;
        self
    }

    /// Record one stage's input/output/metadata. Stages beyond `max_stages` are dropped and flip
    /// `overflowed` (a `trace_overflow` condition, recorded in metadata per §7, never surfaced as
    /// a request error). Oversize payloads are elided with a sentinel rather than truncated.
    pub fn record_stage(
        &mut self,
        stage: impl Into<String>,
        input: Value,
        output: Value,
        metadata: Value,
        processing_time_ms: u64,
    ) {
        if self.stages.len() >= self.max_stages {
            self.overflowed = true;
            return;
        }
        let input = self.elide_if_oversize(input);
        let output = self.elide_if_oversize(output);
        self.stages.push(StageTrace {
            stage: stage.into(),
            input,
            output,
            metadata,
            processing_time_ms,
            timestamp: Utc::now(),
        });
    }

    fn elide_if_oversize(&self, value: Value) -> Value {
        let approx_size = value.to_string().len();
        if approx_size > self.max_data_size_bytes {
            Value::String(ELIDED_SENTINEL.to_string())
        } else {
            value
        }
    }

    pub fn stages(&self) -> &[StageTrace] {
        &self.stages
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn total_processing_time_ms(&self) -> u64 {
        self.stages.iter().map(|s| s.processing_time_ms).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_capped_and_overflow_recorded() {
        let mut trace = TraceContext::new().with_caps(2, 4);
        for i in 0..3 {
            trace.record_stage(format!("stage{i}"), Value::Null, Value::Null, Value::Null, 1);
        }
        assert_eq!(trace.stages().len(), 2);
        assert!(trace.overflowed());
    }

    #[test]
    fn oversize_payload_elided() {
        let mut trace = TraceContext::new().with_caps(8, 0);
        trace.record_stage("stage", Value::String("x".repeat(64)), Value::Null, Value::Null, 1);
        assert_eq!(
            trace.stages()[0].input,
            Value::String(ELIDED_SENTINEL.to_string())
        );
    }
}
