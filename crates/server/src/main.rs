//! voice-core server entry point (§4.10): loads config, validates it, wires the workflow engine
//! and component manager, and serves HTTP + WebSocket until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_core_audio::{RmsVad, RubatoAudioResampler};
use voice_core_config::{load_settings, validate, AvailableProviders, CoreConfig};
use voice_core_handlers::{AudioHandler, ConversationHandler, TimerHandler};
use voice_core_intents::{IntentRegistry, Orchestrator, Recognizer};
use voice_core_runtime::{init_metrics, ComponentManager, ContextManager, FactoryRegistry, ServiceRegistry, TimerManager};
use voice_core_server::{create_router, AppState};
use voice_core_workflow::WorkflowEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("VOICE_CORE_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: failed to load config: {e}. Using defaults.");
            CoreConfig::default()
        }
    };

    init_tracing(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting voice-core server");

    let validation = validate(&config, &AvailableProviders::default());
    for warning in &validation.warnings {
        tracing::warn!(field = %warning.field, message = %warning.message, "config warning");
    }
    if validation.is_fatal() {
        for error in &validation.errors {
            tracing::error!(field = %error.field, message = %error.message, "config error");
        }
        return Err(format!("configuration invalid: {} error(s)", validation.errors.len()).into());
    }

    init_metrics();
    tracing::info!("metrics recorder installed, serving at /metrics");

    let mut components = ComponentManager::new(FactoryRegistry::new(), ServiceRegistry::new());
    components
        .initialize_components(&config)
        .await
        .map_err(|e| format!("component initialization failed: {e}"))?;

    let context_manager = ContextManager::from_config(&config.context);

    let mut timer_manager = TimerManager::new();
    timer_manager.start();

    let mut registry = IntentRegistry::new();
    registry.register_handler(Arc::new(ConversationHandler::new()));
    registry.register_handler(Arc::new(AudioHandler::new()));
    registry.register_handler(Arc::new(TimerHandler::new(
        Arc::new(Mutex::new(timer_manager)),
        context_manager.clone(),
    )));

    let mut recognizer = Recognizer::new().with_confidence_threshold(config.intent_system.confidence_threshold);
    let donations = components.post_initialize_coordination(&registry.handlers());
    recognizer.load_donations(&donations);
    let recognizer = Arc::new(recognizer);
    let components = Arc::new(components);
    let context_manager = Arc::new(context_manager);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(registry),
        config.intent_system.domain_priorities.clone(),
        config.intent_system.destructive_actions.clone(),
    ));

    let vad_config = voice_core::traits::VADConfig {
        threshold: config.vad.threshold,
        voice_frames_required: config.vad.voice_frames_required,
        silence_frames_required: config.vad.silence_frames_required,
        max_segment_duration_s: config.vad.max_segment_duration_s,
    };

    let engine = WorkflowEngine::new(
        config.workflows.unified_voice_assistant.clone(),
        config.workflows.latency_budget_ms,
        context_manager.clone(),
        recognizer,
        orchestrator,
    )
    .with_vad(Arc::new(RmsVad::new(vad_config)))
    .with_resampler(Arc::new(RubatoAudioResampler::new(config.resampling.cache_max_entries)));
    let engine = Arc::new(engine);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let state = AppState::new(config, engine, context_manager, components);
    let app = create_router(state);

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

fn init_tracing(config: &CoreConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("voice_core={},tower_http=info", config.system.log_level).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.system.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
