//! `Component` — the contract the component manager (§4.1) initializes and wires.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("component not available: {0}")]
    NotAvailable(String),
    #[error("dependency cycle detected among: {0:?}")]
    DependencyCycle(Vec<String>),
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
}

/// A fixed set of framework services a component may declare a dependency on (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceName {
    ContextManager,
    TimerManager,
    WorkflowManager,
    PluginManager,
    InputManager,
    Config,
}

impl ServiceName {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceName::ContextManager => "context_manager",
            ServiceName::TimerManager => "timer_manager",
            ServiceName::WorkflowManager => "workflow_manager",
            ServiceName::PluginManager => "plugin_manager",
            ServiceName::InputManager => "input_manager",
            ServiceName::Config => "config",
        }
    }
}

/// A pluggable component managed by the component manager (§4.1). `initialize` must be
/// idempotent: the manager may call it more than once defensively (e.g. after a dependency
/// re-resolution) and a well-behaved component returns immediately on the second call.
#[async_trait]
pub trait Component: Send + Sync {
    /// Stable registry name, e.g. `"tts"`, `"asr"`.
    fn name(&self) -> &str;

    /// Other components this one depends on, by registry name.
    fn get_component_dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Framework services this component needs injected, by name.
    fn get_service_dependencies(&self) -> Vec<ServiceName> {
        Vec::new()
    }

    async fn initialize(&mut self) -> Result<(), ComponentError>;

    async fn shutdown(&mut self);

    fn is_initialized(&self) -> bool;
}

/// The deployment profile derived from the enabled component/input set (§4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentProfile {
    Voice,
    Api,
    Headless,
    Custom(usize),
}

impl std::fmt::Display for DeploymentProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentProfile::Voice => write!(f, "voice"),
            DeploymentProfile::Api => write!(f, "api"),
            DeploymentProfile::Headless => write!(f, "headless"),
            DeploymentProfile::Custom(n) => write!(f, "custom({n})"),
        }
    }
}

/// Inputs to deployment-profile detection, kept narrow and boolean so the detection logic is a
/// pure function of a handful of flags rather than the whole config tree.
#[derive(Debug, Clone, Default)]
pub struct ProfileInputs {
    pub microphone_enabled: bool,
    pub web_enabled: bool,
    pub cli_enabled: bool,
    pub tts_enabled: bool,
    pub audio_enabled: bool,
    pub asr_enabled: bool,
    pub web_api_enabled: bool,
    pub enabled_component_count: usize,
}

/// Derive the deployment profile from the enabled set (§4.1). Ported directly from the original
/// implementation's `get_deployment_profile`.
pub fn detect_deployment_profile(inputs: &ProfileInputs) -> DeploymentProfile {
    if inputs.microphone_enabled && inputs.tts_enabled && inputs.audio_enabled && inputs.asr_enabled {
        return DeploymentProfile::Voice;
    }
    if inputs.web_enabled && !inputs.microphone_enabled && inputs.web_api_enabled && !inputs.tts_enabled {
        return DeploymentProfile::Api;
    }
    if inputs.cli_enabled && !inputs.microphone_enabled && !inputs.web_api_enabled && !inputs.tts_enabled {
        return DeploymentProfile::Headless;
    }
    DeploymentProfile::Custom(inputs.enabled_component_count)
}

/// A component's declared service-dependency map, as handed back to the manager for injection.
pub type ServiceDependencyMap = HashMap<String, ServiceName>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_profile_requires_all_four() {
        let inputs = ProfileInputs {
            microphone_enabled: true,
            tts_enabled: true,
            audio_enabled: true,
            asr_enabled: true,
            ..Default::default()
        };
        assert_eq!(detect_deployment_profile(&inputs), DeploymentProfile::Voice);
    }

    #[test]
    fn api_profile_is_web_without_tts_or_mic() {
        let inputs = ProfileInputs {
            web_enabled: true,
            web_api_enabled: true,
            ..Default::default()
        };
        assert_eq!(detect_deployment_profile(&inputs), DeploymentProfile::Api);
    }

    #[test]
    fn headless_profile_is_cli_only() {
        let inputs = ProfileInputs {
            cli_enabled: true,
            ..Default::default()
        };
        assert_eq!(detect_deployment_profile(&inputs), DeploymentProfile::Headless);
    }

    #[test]
    fn anything_else_is_custom() {
        let inputs = ProfileInputs {
            web_enabled: true,
            tts_enabled: true,
            enabled_component_count: 3,
            ..Default::default()
        };
        assert_eq!(detect_deployment_profile(&inputs), DeploymentProfile::Custom(3));
    }
}
