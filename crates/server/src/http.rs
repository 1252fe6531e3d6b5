//! HTTP router (§4.10): dashboard, status, command/audio execution, tracing, health, and the
//! ambient AsyncAPI/metrics surfaces.
//!
//! Grounded on the donor's `http.rs` for the CORS-layer-building idiom and `TraceLayer` ordering,
//! and on the Python original's `webapi_router.py` for the REST endpoint bodies (the 8KB-chunked
//! upload read with a running size check, the `CommandResponse`/`TraceCommandResponse` shapes).

use axum::extract::{Multipart, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use voice_core::TraceContext;
use voice_core_runtime::render_metrics;

use crate::asyncapi;
use crate::error::ServerError;
use crate::state::AppState;
use crate::websocket;

pub fn create_router(state: AppState) -> Router {
    let cors_layer = {
        let config = state.config.try_read().expect("config lock uncontended at startup");
        build_cors_layer(&config.server.cors_origins, config.server.cors_enabled)
    };

    Router::new()
        .route("/", get(dashboard))
        .route("/status", get(status))
        .route("/execute/command", axum::routing::post(execute_command))
        .route("/execute/audio", axum::routing::post(execute_audio))
        .route("/trace/command", axum::routing::post(trace_command))
        .route("/trace/audio", axum::routing::post(trace_audio))
        .route("/health", get(health))
        .route("/components", get(components))
        .route("/system/status", get(system_status))
        .route("/system/capabilities", get(system_capabilities))
        .route("/asyncapi.json", get(asyncapi_json))
        .route("/asyncapi.yaml", get(asyncapi_yaml))
        .route("/asyncapi.html", get(asyncapi_html))
        .route("/metrics", get(metrics))
        .route("/ws/asr/stream", get(websocket::asr_stream))
        .route("/ws/asr/binary", get(websocket::asr_binary))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build the CORS layer from `[server]` config. Mirrors the donor's `build_cors_layer`: disabled
/// means permissive (dev only), empty origins fall back to `localhost:3000`, invalid origins are
/// dropped with a warning rather than failing startup.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (not for production)");
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(origin, "invalid CORS origin, dropping");
                None
            })
        })
        .collect();

    if parsed.is_empty() {
        tracing::info!("no usable CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().expect("static origin parses"))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_credentials(true)
}

async fn dashboard(State(state): State<AppState>) -> Html<String> {
    let active = state.components.active_components();
    let failed = state.components.failed_components();
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>voice-core</title></head>
<body>
<h1>voice-core</h1>
<p>uptime: {}s</p>
<p>active components: {}</p>
<p>failed components: {}</p>
<ul>
<li><a href="/status">/status</a></li>
<li><a href="/health">/health</a></li>
<li><a href="/system/capabilities">/system/capabilities</a></li>
<li><a href="/asyncapi.html">/asyncapi.html</a></li>
</ul>
</body>
</html>"#,
        state.uptime_seconds(),
        active.join(", "),
        failed.keys().cloned().collect::<Vec<_>>().join(", "),
    ))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "active_components": state.components.active_components(),
        "failed_components": state.components.failed_components(),
        "session_count": state.context_manager.session_count(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: String,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    success: bool,
    response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

const REST_SESSION_ID: &str = "webapi_session";
const AUDIO_SESSION_ID: &str = "audio_session";

async fn execute_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Json<CommandResponse> {
    let client_context = Some(json!({"source": "rest_api"}));
    let result = state
        .engine
        .process_text_input(&request.command, REST_SESSION_ID, false, client_context, None)
        .await;

    Json(CommandResponse {
        success: result.success,
        response: if result.text.is_empty() { "No response generated".to_string() } else { result.text },
        error: result.error,
        metadata: Some(json!({"processed_via": "rest_api", "intent_metadata": result.metadata})),
    })
}

/// Read a multipart `audio_file` field in 8KB chunks (the donor's `webapi_router.py` pattern),
/// rejecting the upload the instant the running total exceeds the configured cap rather than
/// buffering the whole thing first.
async fn read_audio_field(multipart: &mut Multipart, max_bytes: usize) -> Result<Vec<u8>, ServerError> {
    let mut data = Vec::new();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::InvalidRequest(e.to_string()))?
    {
        if field.name() != Some("audio_file") {
            continue;
        }
        loop {
            let chunk = field.chunk().await.map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
            let Some(chunk) = chunk else { break };
            data.extend_from_slice(&chunk);
            if data.len() > max_bytes {
                return Err(ServerError::AudioTooLarge { max_mb: max_bytes as f64 / 1024.0 / 1024.0 });
            }
        }
        return Ok(data);
    }
    Err(ServerError::InvalidRequest("no audio_file field in multipart body".to_string()))
}

fn audio_from_upload(bytes: Vec<u8>) -> voice_core::AudioData {
    use voice_core::{Channels, SampleRate};
    voice_core::AudioData::new(bytes, SampleRate::Hz16000, Channels::Mono)
}

async fn execute_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CommandResponse>, ServerError> {
    let max_bytes = state.config.read().await.server.max_audio_upload_bytes;
    let bytes = read_audio_field(&mut multipart, max_bytes).await?;
    let file_size = bytes.len();
    let audio = audio_from_upload(bytes);

    let client_context = Some(json!({
        "source": "audio_api",
        "skip_wake_word": true,
        "file_size_bytes": file_size,
    }));
    let result = state.engine.process_audio_input(audio, AUDIO_SESSION_ID, false, client_context, None).await;

    Ok(Json(CommandResponse {
        success: result.success,
        response: if result.text.is_empty() { "No response generated".to_string() } else { result.text },
        error: result.error,
        metadata: Some(json!({"processed_via": "audio_api", "intent_metadata": result.metadata})),
    }))
}

#[derive(Debug, Serialize)]
struct TraceCommandResponse {
    success: bool,
    final_result: Value,
    execution_trace: Value,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn build_execution_trace(trace: &TraceContext) -> Value {
    let stages: Vec<Value> = trace
        .stages()
        .iter()
        .map(|s| {
            json!({
                "stage": s.stage,
                "input_data": s.input,
                "output_data": s.output,
                "metadata": s.metadata,
                "processing_time_ms": s.processing_time_ms,
                "timestamp": s.timestamp,
            })
        })
        .collect();

    let stage_breakdown: serde_json::Map<String, Value> = trace
        .stages()
        .iter()
        .map(|s| (s.stage.clone(), json!(s.processing_time_ms)))
        .collect();

    json!({
        "request_id": trace.request_id,
        "pipeline_stages": stages,
        "context_evolution": {
            "before": trace.context_before,
            "after": trace.context_after,
            "changes": context_changes(&trace.context_before, &trace.context_after),
        },
        "performance_metrics": {
            "total_processing_time_ms": trace.total_processing_time_ms(),
            "stage_breakdown": stage_breakdown,
            "total_stages": trace.stages().len(),
        },
    })
}

/// Shallow top-level diff between the session context before and after a turn, for
/// `execution_trace.context_evolution.changes` (§6). Only top-level object keys are compared —
/// deep structural diffing isn't needed for a human skimming what a turn changed.
fn context_changes(before: &Option<Value>, after: &Option<Value>) -> Value {
    let (Some(Value::Object(before)), Some(Value::Object(after))) = (before, after) else {
        return json!({});
    };

    let mut changes = serde_json::Map::new();
    for (key, after_value) in after {
        let before_value = before.get(key).cloned().unwrap_or(Value::Null);
        if &before_value != after_value {
            changes.insert(key.clone(), json!({"before": before_value, "after": after_value}));
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            changes.insert(key.clone(), json!({"before": before[key], "after": Value::Null}));
        }
    }
    Value::Object(changes)
}

async fn trace_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Json<TraceCommandResponse> {
    let mut trace = TraceContext::new();
    let client_context = request.metadata.clone().or_else(|| Some(json!({"source": "rest_api"})));

    let result = state
        .engine
        .process_text_input(&request.command, REST_SESSION_ID, false, client_context, Some(&mut trace))
        .await;

    Json(TraceCommandResponse {
        success: result.success,
        final_result: json!({"text": result.text, "should_speak": result.should_speak, "metadata": result.metadata}),
        execution_trace: build_execution_trace(&trace),
        timestamp: chrono::Utc::now().to_rfc3339(),
        error: result.error,
    })
}

async fn trace_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TraceCommandResponse>, ServerError> {
    let max_bytes = state.config.read().await.server.max_audio_upload_bytes;
    let bytes = read_audio_field(&mut multipart, max_bytes).await?;
    let file_size = bytes.len();
    let audio = audio_from_upload(bytes);

    let mut trace = TraceContext::new();
    let client_context = Some(json!({
        "source": "audio_api",
        "skip_wake_word": true,
        "file_size_bytes": file_size,
    }));
    let result = state
        .engine
        .process_audio_input(audio, AUDIO_SESSION_ID, false, client_context, Some(&mut trace))
        .await;

    Ok(Json(TraceCommandResponse {
        success: result.success,
        final_result: json!({"text": result.text, "should_speak": result.should_speak, "metadata": result.metadata}),
        execution_trace: build_execution_trace(&trace),
        timestamp: chrono::Utc::now().to_rfc3339(),
        error: result.error,
    }))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let degraded = !state.components.failed_components().is_empty();
    let status = if degraded { "degraded" } else { "healthy" };
    let code = if degraded { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };
    (
        code,
        Json(json!({
            "status": status,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": state.uptime_seconds(),
        })),
    )
}

async fn components(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "active": state.components.active_components(),
        "failed": state.components.failed_components(),
    }))
}

async fn system_status(State(state): State<AppState>) -> Json<Value> {
    let config = state.config.read().await;
    Json(json!({
        "environment": config.environment,
        "active_components": state.components.active_components(),
        "failed_components": state.components.failed_components(),
        "session_count": state.context_manager.session_count(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

async fn system_capabilities(State(state): State<AppState>) -> Json<Value> {
    let active = state.components.active_components();
    let profile = voice_core_runtime::deployment_profile(&*state.config.read().await, &active);
    Json(json!({
        "deployment_profile": profile.to_string(),
        "components": active,
        "llm_enrichment_available": state.engine.has_llm(),
    }))
}

async fn asyncapi_json() -> Json<Value> {
    Json(asyncapi::build_asyncapi_spec())
}

async fn asyncapi_yaml() -> Response {
    let spec = asyncapi::build_asyncapi_spec();
    (
        [("content-type", "application/yaml")],
        asyncapi::to_yaml(&spec),
    )
        .into_response()
}

async fn asyncapi_html() -> Html<String> {
    let spec = asyncapi::build_asyncapi_spec();
    let pretty = serde_json::to_string_pretty(&spec).unwrap_or_default();
    Html(asyncapi::to_html(&pretty))
}

async fn metrics() -> Response {
    ([("content-type", "text/plain; version=0.0.4")], render_metrics()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_diff_reports_changed_and_added_keys() {
        let before = Some(json!({"language": "ru", "turn_count": 1}));
        let after = Some(json!({"language": "en", "turn_count": 1, "new_field": true}));
        let changes = context_changes(&before, &after);
        assert_eq!(changes["language"]["before"], "ru");
        assert_eq!(changes["language"]["after"], "en");
        assert!(changes.get("turn_count").is_none());
        assert_eq!(changes["new_field"]["after"], true);
    }

    #[test]
    fn shallow_diff_is_empty_when_either_side_missing() {
        assert_eq!(context_changes(&None, &None), json!({}));
    }
}
