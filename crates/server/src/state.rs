//! Application state (§4.10): everything a handler needs, cloned cheaply per request.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use voice_core_config::CoreConfig;
use voice_core_runtime::ComponentManager;
use voice_core_runtime::ContextManager;
use voice_core_workflow::WorkflowEngine;

/// Shared state across all HTTP and WebSocket handlers.
///
/// `config` is wrapped in a lock for hot-reload (§4.9's validator is re-run by the caller before
/// swapping it in); the engine, context manager, and component manager are immutable for the life
/// of the process — restarting any of them means restarting the server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<CoreConfig>>,
    pub engine: Arc<WorkflowEngine>,
    pub context_manager: Arc<ContextManager>,
    pub components: Arc<ComponentManager>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        config: CoreConfig,
        engine: Arc<WorkflowEngine>,
        context_manager: Arc<ContextManager>,
        components: Arc<ComponentManager>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            engine,
            context_manager,
            components,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
