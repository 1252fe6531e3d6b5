//! Startup configuration validation (§4.9).
//!
//! Exception-for-control-flow in the teacher's `Settings::validate` becomes a typed
//! `ValidationResult`: every check appends to one of three buckets instead of short-circuiting on
//! the first problem, so a single run surfaces everything wrong with the tree at once. Any error
//! is fatal; warnings and infos are logged but do not block startup.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::settings::CoreConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationCategory {
    Capability,
    WorkflowComponent,
    ProviderAvailability,
    InputCoherence,
    EnvironmentVariable,
    Assets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub category: ValidationCategory,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub infos: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_fatal(&self) -> bool {
        !self.errors.is_empty()
    }

    fn error(&mut self, category: ValidationCategory, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            category,
            field: field.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, category: ValidationCategory, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            category,
            field: field.into(),
            message: message.into(),
        });
    }

    fn info(&mut self, category: ValidationCategory, field: impl Into<String>, message: impl Into<String>) {
        self.infos.push(ValidationIssue {
            category,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// The set of provider names this validator run is told are actually discoverable — stands in
/// for the runtime's factory registry, which this crate cannot depend on without a cycle.
#[derive(Debug, Clone, Default)]
pub struct AvailableProviders {
    pub names: Vec<String>,
}

impl AvailableProviders {
    pub fn has(&self, name: &str) -> bool {
        !name.is_empty() && self.names.iter().any(|n| n == name)
    }
}

/// Validate a fully-loaded `CoreConfig`. Checks are independent of each other by design — one
/// failing check never prevents the rest from running.
pub fn validate(config: &CoreConfig, providers: &AvailableProviders) -> ValidationResult {
    let mut result = ValidationResult::default();

    validate_capability_coherence(config, &mut result);
    validate_workflow_component_coherence(config, &mut result);
    validate_provider_availability(config, providers, &mut result);
    validate_input_coherence(config, &mut result);
    validate_env_var_references(config, &mut result);
    validate_assets(config, &mut result);
    validate_ports(config, &mut result);

    result
}

fn validate_capability_coherence(config: &CoreConfig, result: &mut ValidationResult) {
    if config.component_enabled("tts") && !config.system.audio_playback_enabled {
        result.error(
            ValidationCategory::Capability,
            "system.audio_playback_enabled",
            "components.tts is enabled but system.audio_playback_enabled is false",
        );
    }
    if config.inputs.is_enabled("web") && !config.system.web_api_enabled {
        result.error(
            ValidationCategory::Capability,
            "system.web_api_enabled",
            "inputs.web is enabled but system.web_api_enabled is false",
        );
    }
}

fn validate_workflow_component_coherence(config: &CoreConfig, result: &mut ValidationResult) {
    let stages = &config.workflows.unified_voice_assistant;
    let checks: &[(&str, bool, &str)] = &[
        ("voice_trigger", stages.voice_trigger_enabled, "voice_trigger"),
        ("asr", stages.asr_enabled, "asr"),
        ("text_processor", stages.text_processing_enabled, "text_processing"),
        ("nlu", stages.nlu_enabled, "nlu"),
        ("llm", stages.llm_enabled, "llm"),
        ("tts", stages.tts_enabled, "tts"),
    ];
    for (component, stage_enabled, field) in checks {
        let component_enabled = config.component_enabled(component);
        if *stage_enabled && !component_enabled {
            result.error(
                ValidationCategory::WorkflowComponent,
                format!("workflows.unified_voice_assistant.{field}_enabled"),
                format!("stage enabled but components.{component} is not"),
            );
        }
        if component_enabled && !*stage_enabled {
            result.warn(
                ValidationCategory::WorkflowComponent,
                format!("components.{component}"),
                "component enabled but its workflow stage is not — wasted resource",
            );
        }
    }
}

fn validate_provider_availability(
    config: &CoreConfig,
    providers: &AvailableProviders,
    result: &mut ValidationResult,
) {
    for (name, component) in &config.components {
        if !component.enabled {
            continue;
        }
        if !providers.has(&component.default_provider) {
            result.error(
                ValidationCategory::ProviderAvailability,
                format!("components.{name}.default_provider"),
                format!("provider '{}' is not discoverable", component.default_provider),
            );
        }
        for fallback in &component.fallback_providers {
            if !providers.has(fallback) {
                result.warn(
                    ValidationCategory::ProviderAvailability,
                    format!("components.{name}.fallback_providers"),
                    format!("fallback provider '{fallback}' is not discoverable"),
                );
            }
        }
    }
}

fn validate_input_coherence(config: &CoreConfig, result: &mut ValidationResult) {
    if !config.inputs.is_enabled(&config.inputs.default_input) {
        result.error(
            ValidationCategory::InputCoherence,
            "inputs.default_input",
            format!("'{}' is not among enabled inputs", config.inputs.default_input),
        );
    }
    if !config.inputs.enabled.values().any(|&e| e) {
        result.error(
            ValidationCategory::InputCoherence,
            "inputs.enabled",
            "at least one input must be enabled",
        );
    }
    if config.inputs.sample_rate_hz == 0 {
        result.error(
            ValidationCategory::InputCoherence,
            "inputs.sample_rate_hz",
            "sample rate must be non-zero",
        );
    }
    if config.inputs.channels == 0 || config.inputs.channels > 2 {
        result.error(
            ValidationCategory::InputCoherence,
            "inputs.channels",
            "channels must be 1 (mono) or 2 (stereo)",
        );
    }
}

fn env_var_pattern() -> Regex {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern is valid")
}

/// Walk every string-valued leaf looking for `${VAR}` references and confirm they resolve.
fn validate_env_var_references(config: &CoreConfig, result: &mut ValidationResult) {
    let pattern = env_var_pattern();
    let serialized = toml::to_string(config).unwrap_or_default();
    for caps in pattern.captures_iter(&serialized) {
        let var_name = &caps[1];
        if std::env::var(var_name).is_err() {
            result.error(
                ValidationCategory::EnvironmentVariable,
                var_name,
                format!("referenced as ${{{var_name}}} but is not set"),
            );
        } else {
            result.info(
                ValidationCategory::EnvironmentVariable,
                var_name,
                "resolved",
            );
        }
    }
}

fn validate_assets(config: &CoreConfig, result: &mut ValidationResult) {
    let root = Path::new(&config.assets.root);
    if root.exists() {
        if !root.is_dir() {
            result.error(
                ValidationCategory::Assets,
                "assets.root",
                format!("{} exists but is not a directory", config.assets.root),
            );
        }
        return;
    }
    match std::fs::create_dir_all(root) {
        Ok(()) => result.info(
            ValidationCategory::Assets,
            "assets.root",
            format!("created {}", config.assets.root),
        ),
        Err(err) => result.error(
            ValidationCategory::Assets,
            "assets.root",
            format!("does not exist and cannot be created: {err}"),
        ),
    }
}

fn validate_ports(config: &CoreConfig, result: &mut ValidationResult) {
    if config.server.port == config.server.metrics_port {
        result.error(
            ValidationCategory::Capability,
            "server.metrics_port",
            format!(
                "metrics_port conflicts with server.port ({})",
                config.server.port
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ComponentConfig;

    fn config_with_tts(audio_playback_enabled: bool) -> CoreConfig {
        let mut config = CoreConfig::default();
        config.system.audio_playback_enabled = audio_playback_enabled;
        config.components.insert(
            "tts".to_string(),
            ComponentConfig {
                enabled: true,
                default_provider: "local".to_string(),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn tts_without_audio_playback_is_fatal() {
        let config = config_with_tts(false);
        let result = validate(&config, &AvailableProviders::default());
        assert!(result.is_fatal());
        assert!(result
            .errors
            .iter()
            .any(|e| e.category == ValidationCategory::Capability));
    }

    #[test]
    fn tts_with_audio_playback_and_provider_passes_capability_check() {
        let config = config_with_tts(true);
        let providers = AvailableProviders {
            names: vec!["local".to_string()],
        };
        let result = validate(&config, &providers);
        assert!(!result
            .errors
            .iter()
            .any(|e| e.category == ValidationCategory::Capability));
    }

    #[test]
    fn enabled_component_without_enabled_stage_warns() {
        let mut config = CoreConfig::default();
        config.workflows.unified_voice_assistant.tts_enabled = false;
        config.system.audio_playback_enabled = true;
        config.components.insert(
            "tts".to_string(),
            ComponentConfig {
                enabled: true,
                default_provider: "local".to_string(),
                ..Default::default()
            },
        );
        let providers = AvailableProviders {
            names: vec!["local".to_string()],
        };
        let result = validate(&config, &providers);
        assert!(!result
            .warnings
            .iter()
            .filter(|w| w.category == ValidationCategory::WorkflowComponent)
            .collect::<Vec<_>>()
            .is_empty());
    }

    #[test]
    fn missing_default_input_is_fatal() {
        let mut config = CoreConfig::default();
        config.inputs.default_input = "microphone".to_string();
        let result = validate(&config, &AvailableProviders::default());
        assert!(result.is_fatal());
    }

    #[test]
    fn unset_env_var_reference_is_fatal() {
        let mut config = CoreConfig::default();
        config.assets.root = "${DEFINITELY_UNSET_VAR_XYZ}".to_string();
        let result = validate(&config, &AvailableProviders::default());
        assert!(result.is_fatal());
    }

    #[test]
    fn port_conflict_is_fatal() {
        let mut config = CoreConfig::default();
        config.server.metrics_port = config.server.port;
        let result = validate(&config, &AvailableProviders::default());
        assert!(result.is_fatal());
    }
}
