//! Component manager (§4.1).
//!
//! Ported from the original's `ComponentManager`/`DependencyResolver`: components are created by
//! a static factory registry (this core's answer to the original's entry-point discovery — see
//! §4.1's note on why a literal entry-point registry doesn't translate), ordered with Kahn's
//! algorithm over the enabled subset's dependency graph, initialized with component + service
//! dependencies injected, and torn down in reverse order. A failed component is recorded, not
//! fatal; a configured fallback provider list is tried before giving up on it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{info, warn};

use voice_core::traits::{Component, ComponentError, DeploymentProfile, IntentHandler, ProfileInputs, ServiceName};
use voice_core::Donation;
use voice_core_config::CoreConfig;

/// Builds one component instance from its config slice. Registered once per built-in provider
/// under a namespaced key (`"asr.vosk"`, `"tts.console"`, …), mirroring the original's namespaced
/// entry-point groups without pretending Rust has `importlib.metadata` discovery.
pub type ComponentFactory = Arc<dyn Fn(&CoreConfig) -> Box<dyn Component> + Send + Sync>;

/// Framework services a component may declare a dependency on, resolved by name at injection
/// time. Concrete service handles live in `runtime`'s other modules; this manager only tracks
/// which services each component asked for.
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    present: Vec<ServiceName>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, service: ServiceName) -> Self {
        self.present.push(service);
        self
    }

    fn has(&self, service: ServiceName) -> bool {
        self.present.contains(&service)
    }
}

#[derive(Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, ComponentFactory>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: ComponentFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

/// Component manager: factory registry + dependency resolution + lifecycle.
pub struct ComponentManager {
    factories: FactoryRegistry,
    fallback_map: HashMap<String, Vec<String>>,
    components: HashMap<String, Box<dyn Component>>,
    failed: HashMap<String, String>,
    services: ServiceRegistry,
    initialized: bool,
}

impl ComponentManager {
    pub fn new(factories: FactoryRegistry, services: ServiceRegistry) -> Self {
        Self {
            factories,
            fallback_map: HashMap::new(),
            components: HashMap::new(),
            failed: HashMap::new(),
            services,
            initialized: false,
        }
    }

    /// Configure fallback candidates tried, in order, when `name` fails to initialize (§4.1's
    /// "fallback map", e.g. `tts -> [console_tts, fallback_tts]`).
    pub fn with_fallback(mut self, name: impl Into<String>, candidates: Vec<String>) -> Self {
        self.fallback_map.insert(name.into(), candidates);
        self
    }

    /// Initialize every component enabled in `config.components`, in dependency order, tolerating
    /// individual failures (§4.1 "Graceful degradation").
    pub async fn initialize_components(&mut self, config: &CoreConfig) -> Result<(), ComponentError> {
        if self.initialized {
            return Ok(());
        }

        let enabled: Vec<String> = self
            .factories
            .names()
            .into_iter()
            .filter(|name| config.component_enabled(name))
            .collect();

        let order = topological_order(&enabled, &self.factories, config)?;
        info!(?order, "component initialization order resolved");

        for name in &order {
            if let Err(err) = self.initialize_one(name, config).await {
                warn!(component = %name, error = %err, "component failed to initialize");
                self.failed.insert(name.clone(), err.to_string());
                self.attempt_fallback(name, config).await;
            }
        }

        self.initialized = true;
        info!(
            succeeded = self.components.len(),
            failed = self.failed.len(),
            "component system initialized"
        );
        if !self.failed.is_empty() {
            warn!(failed = ?self.failed.keys().collect::<Vec<_>>(), "components degraded");
        }
        Ok(())
    }

    async fn initialize_one(&mut self, name: &str, config: &CoreConfig) -> Result<(), ComponentError> {
        let factory = self
            .factories
            .factories
            .get(name)
            .ok_or_else(|| ComponentError::NotAvailable(name.to_string()))?
            .clone();

        let mut component = factory(config);
        self.check_service_dependencies(component.as_ref())?;
        component.initialize().await?;
        self.components.insert(name.to_string(), component);
        Ok(())
    }

    fn check_service_dependencies(&self, component: &dyn Component) -> Result<(), ComponentError> {
        for service in component.get_service_dependencies() {
            if !self.services.has(service) {
                warn!(
                    component = component.name(),
                    service = service.as_str(),
                    "required service dependency not available"
                );
            }
        }
        Ok(())
    }

    async fn attempt_fallback(&mut self, name: &str, config: &CoreConfig) {
        let Some(candidates) = self.fallback_map.get(name).cloned() else {
            return;
        };
        for candidate in candidates {
            if !self.factories.factories.contains_key(&candidate) {
                continue;
            }
            info!(component = name, fallback = %candidate, "attempting fallback component");
            match self.initialize_one(&candidate, config).await {
                Ok(()) => {
                    info!(component = name, fallback = %candidate, "fallback initialized");
                    return;
                }
                Err(err) => {
                    warn!(component = name, fallback = %candidate, error = %err, "fallback also failed");
                }
            }
        }
    }

    /// Post-initialization cross-wiring (§4.1): resolve each intent handler's declared component
    /// dependencies against the now-initialized component set and inject them, then collect every
    /// handler's donation manifest for NLU loading. Context-manager injection into handlers (the
    /// third leg of §4.1's second pass) happens at construction time instead — handlers that need
    /// it take an `Arc<ContextManager>` in their own constructor, the same way `TimerHandler`
    /// already takes its `TimerManager` — since this manager has no reason to know about that
    /// concrete type.
    pub fn post_initialize_coordination(&self, handlers: &[Arc<dyn IntentHandler>]) -> Vec<Donation> {
        for handler in handlers {
            for dependency in handler.component_dependencies() {
                match self.get_component(&dependency) {
                    Some(component) => handler.inject_component(&dependency, component),
                    None => warn!(
                        handler = handler.name(),
                        component = %dependency,
                        "declared component dependency not available, skipping injection"
                    ),
                }
            }
        }

        let donations: Vec<Donation> = handlers.iter().filter_map(|h| h.donation().cloned()).collect();
        info!(
            handlers = handlers.len(),
            donations = donations.len(),
            "post-initialization coordination complete"
        );
        donations
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn get_component(&self, name: &str) -> Option<&dyn Component> {
        self.components.get(name).map(|c| c.as_ref())
    }

    pub fn active_components(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    pub fn failed_components(&self) -> &HashMap<String, String> {
        &self.failed
    }

    pub async fn shutdown_all(&mut self) {
        if !self.initialized {
            return;
        }
        info!("shutting down component system");
        let order: Vec<String> = self.components.keys().cloned().collect();
        for name in order.into_iter().rev() {
            if let Some(mut component) = self.components.remove(&name) {
                component.shutdown().await;
                info!(component = %name, "component shut down");
            }
        }
        self.failed.clear();
        self.initialized = false;
    }
}

/// Kahn's algorithm over the enabled-component dependency graph (§4.1). A component's
/// dependencies are read by instantiating it once (components must be cheap to construct) and
/// discarding the instance — the original does the same via a throwaway instance.
fn topological_order(
    enabled: &[String],
    factories: &FactoryRegistry,
    config: &CoreConfig,
) -> Result<Vec<String>, ComponentError> {
    let mut dependents: HashMap<String, Vec<String>> = enabled.iter().map(|n| (n.clone(), Vec::new())).collect();
    let mut in_degree: HashMap<String, usize> = enabled.iter().map(|n| (n.clone(), 0)).collect();

    for name in enabled {
        let Some(factory) = factories.factories.get(name) else {
            continue;
        };
        let probe = factory(config);
        for dep in probe.get_component_dependencies() {
            if let Some(edges) = dependents.get_mut(&dep) {
                edges.push(name.clone());
                *in_degree.get_mut(name).expect("name is in enabled set") += 1;
            }
        }
    }

    let mut queue: VecDeque<String> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(name, _)| name.clone())
        .collect();
    let mut queue_sorted: Vec<String> = queue.drain(..).collect();
    queue_sorted.sort();
    let mut queue: VecDeque<String> = queue_sorted.into();

    let mut order = Vec::with_capacity(enabled.len());
    while let Some(name) = queue.pop_front() {
        order.push(name.clone());
        if let Some(edges) = dependents.get(&name) {
            for next in edges {
                let deg = in_degree.get_mut(next).expect("edge target tracked");
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(next.clone());
                }
            }
        }
    }

    if order.len() != enabled.len() {
        let unresolved: Vec<String> = enabled.iter().filter(|n| !order.contains(n)).cloned().collect();
        return Err(ComponentError::DependencyCycle(unresolved));
    }

    Ok(order)
}

/// Build the `ProfileInputs` snapshot `detect_deployment_profile` needs, from the resolved config
/// tree and the set of components that actually initialized.
pub fn profile_inputs_from_config(config: &CoreConfig, active_components: &[String]) -> ProfileInputs {
    let has = |name: &str| active_components.iter().any(|c| c == name);
    ProfileInputs {
        microphone_enabled: config.inputs.enabled.get("microphone").copied().unwrap_or(false),
        web_enabled: config.inputs.enabled.get("web").copied().unwrap_or(false),
        cli_enabled: config.inputs.enabled.get("cli").copied().unwrap_or(false),
        tts_enabled: has("tts"),
        audio_enabled: has("audio"),
        asr_enabled: has("asr"),
        web_api_enabled: config.system.web_api_enabled,
        enabled_component_count: active_components.len(),
    }
}

pub fn deployment_profile(config: &CoreConfig, active_components: &[String]) -> DeploymentProfile {
    voice_core::traits::detect_deployment_profile(&profile_inputs_from_config(config, active_components))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubComponent {
        name: &'static str,
        deps: Vec<String>,
        initialized: bool,
        fail: bool,
    }

    #[async_trait]
    impl Component for StubComponent {
        fn name(&self) -> &str {
            self.name
        }

        fn get_component_dependencies(&self) -> Vec<String> {
            self.deps.clone()
        }

        async fn initialize(&mut self) -> Result<(), ComponentError> {
            if self.fail {
                return Err(ComponentError::InitializationFailed(self.name.to_string()));
            }
            self.initialized = true;
            Ok(())
        }

        async fn shutdown(&mut self) {
            self.initialized = false;
        }

        fn is_initialized(&self) -> bool {
            self.initialized
        }
    }

    fn factory_registry() -> FactoryRegistry {
        let mut registry = FactoryRegistry::new();
        registry.register(
            "context_manager",
            Arc::new(|_: &CoreConfig| {
                Box::new(StubComponent {
                    name: "context_manager",
                    deps: vec![],
                    initialized: false,
                    fail: false,
                }) as Box<dyn Component>
            }),
        );
        registry.register(
            "tts",
            Arc::new(|_: &CoreConfig| {
                Box::new(StubComponent {
                    name: "tts",
                    deps: vec!["context_manager".to_string()],
                    initialized: false,
                    fail: false,
                }) as Box<dyn Component>
            }),
        );
        registry
    }

    fn enabled_config() -> CoreConfig {
        let mut config = CoreConfig::default();
        for name in ["context_manager", "tts"] {
            config.components.insert(
                name.to_string(),
                voice_core_config::ComponentConfig {
                    enabled: true,
                    ..Default::default()
                },
            );
        }
        config
    }

    #[tokio::test]
    async fn dependencies_initialize_before_dependents() {
        let mut manager = ComponentManager::new(factory_registry(), ServiceRegistry::new());
        let config = enabled_config();
        manager.initialize_components(&config).await.unwrap();

        assert!(manager.has_component("context_manager"));
        assert!(manager.has_component("tts"));
        assert!(manager.failed_components().is_empty());
    }

    #[tokio::test]
    async fn failed_component_is_recorded_not_fatal() {
        let mut registry = FactoryRegistry::new();
        registry.register(
            "asr",
            Arc::new(|_: &CoreConfig| {
                Box::new(StubComponent {
                    name: "asr",
                    deps: vec![],
                    initialized: false,
                    fail: true,
                }) as Box<dyn Component>
            }),
        );
        let mut config = CoreConfig::default();
        config.components.insert(
            "asr".to_string(),
            voice_core_config::ComponentConfig {
                enabled: true,
                ..Default::default()
            },
        );

        let mut manager = ComponentManager::new(registry, ServiceRegistry::new());
        manager.initialize_components(&config).await.unwrap();

        assert!(!manager.has_component("asr"));
        assert!(manager.failed_components().contains_key("asr"));
    }

    #[tokio::test]
    async fn shutdown_clears_all_components() {
        let mut manager = ComponentManager::new(factory_registry(), ServiceRegistry::new());
        let config = enabled_config();
        manager.initialize_components(&config).await.unwrap();
        manager.shutdown_all().await;

        assert!(manager.active_components().is_empty());
    }

    #[test]
    fn voice_profile_detected_from_active_components() {
        let mut config = CoreConfig::default();
        config.inputs.enabled.insert("microphone".to_string(), true);
        let profile = deployment_profile(&config, &["tts".to_string(), "audio".to_string(), "asr".to_string()]);
        assert_eq!(profile, DeploymentProfile::Voice);
    }
}
