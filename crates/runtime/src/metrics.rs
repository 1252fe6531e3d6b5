//! Metrics collector (§4.8): a typed wrapper over the `metrics` facade so call sites record
//! named counters/histograms instead of sprinkling string literals through the pipeline.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the process-wide recorder. Call once at startup; a second call is a no-op (the handle
/// is already installed, so this just logs and returns).
pub fn init_metrics() {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::warn!("metrics recorder already initialized");
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle);
            tracing::info!("metrics recorder initialized");
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to install prometheus recorder");
        }
    }
}

/// Render the current metrics snapshot in Prometheus text exposition format, for the `/metrics`
/// endpoint (§4.10, ambient infrastructure outside the AsyncAPI-tracked surface). Empty if
/// `init_metrics` was never called or failed to install.
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE.get().map(|h| h.render()).unwrap_or_default()
}

pub fn record_request(stage: &str) {
    counter!("voice_core_requests_total", "stage" => stage.to_string()).increment(1);
}

pub fn record_error(stage: &str, kind: &str) {
    counter!("voice_core_errors_total", "stage" => stage.to_string(), "kind" => kind.to_string()).increment(1);
}

pub fn record_stage_latency(stage: &str, duration_ms: f64) {
    histogram!("voice_core_stage_latency_ms", "stage" => stage.to_string()).record(duration_ms);
}

pub fn record_intent_execution(intent_name: &str, success: bool, latency_ms: f64) {
    counter!(
        "voice_core_intent_executions_total",
        "intent" => intent_name.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
    histogram!("voice_core_intent_latency_ms", "intent" => intent_name.to_string()).record(latency_ms);
}

pub fn record_total_latency(duration_ms: f64) {
    histogram!("voice_core_total_latency_ms").record(duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_metrics_does_not_panic_without_a_recorder_installed() {
        record_request("asr");
        record_error("asr", "timeout");
        record_stage_latency("asr", 42.0);
        record_intent_execution("timer.set", true, 10.0);
        record_total_latency(120.0);
    }
}
