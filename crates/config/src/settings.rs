//! The strongly-typed configuration tree rooted at `CoreConfig` (§3, §4.9).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// System-wide capability flags the validator cross-checks against component/input toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub audio_playback_enabled: bool,
    #[serde(default)]
    pub web_api_enabled: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            audio_playback_enabled: false,
            web_api_enabled: false,
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Flat map of input-source name to enabled flag, plus the one default used for session id
/// generation and the "at least one enabled" invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputsConfig {
    #[serde(default)]
    pub enabled: HashMap<String, bool>,
    #[serde(default = "default_input")]
    pub default_input: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,
    #[serde(default = "default_channels")]
    pub channels: u8,
}

fn default_input() -> String {
    "cli".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u8 {
    1
}

impl Default for InputsConfig {
    fn default() -> Self {
        let mut enabled = HashMap::new();
        enabled.insert("cli".to_string(), true);
        Self {
            enabled,
            default_input: default_input(),
            sample_rate_hz: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

impl InputsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.get(name).copied().unwrap_or(false)
    }
}

/// One provider-backed component's configuration: which providers it can use, which one it
/// prefers, and the order to fall back through (§4.1, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComponentConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub default_provider: String,
    #[serde(default)]
    pub fallback_providers: Vec<String>,
    #[serde(default)]
    pub providers: HashMap<String, toml::Value>,
}

/// Per-stage enable flags for the unified voice assistant workflow (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStagesConfig {
    #[serde(default = "default_true")]
    pub voice_trigger_enabled: bool,
    #[serde(default = "default_true")]
    pub vad_enabled: bool,
    #[serde(default = "default_true")]
    pub asr_enabled: bool,
    #[serde(default = "default_true")]
    pub text_processing_enabled: bool,
    #[serde(default = "default_true")]
    pub nlu_enabled: bool,
    #[serde(default = "default_true")]
    pub intent_execution_enabled: bool,
    #[serde(default)]
    pub llm_enabled: bool,
    #[serde(default = "default_true")]
    pub tts_enabled: bool,
    #[serde(default = "default_true")]
    pub audio_output_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for WorkflowStagesConfig {
    fn default() -> Self {
        Self {
            voice_trigger_enabled: true,
            vad_enabled: true,
            asr_enabled: true,
            text_processing_enabled: true,
            nlu_enabled: true,
            intent_execution_enabled: true,
            llm_enabled: false,
            tts_enabled: true,
            audio_output_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowsConfig {
    #[serde(default)]
    pub unified_voice_assistant: WorkflowStagesConfig,
    #[serde(default = "default_latency_budget_ms")]
    pub latency_budget_ms: u64,
    #[serde(default = "default_max_trace_stages")]
    pub max_trace_stages: usize,
}

fn default_latency_budget_ms() -> u64 {
    1500
}

fn default_max_trace_stages() -> usize {
    32
}

/// Tunables for the intent registry/orchestrator (§4.5, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentSystemConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_fallback_intent")]
    pub fallback_intent: String,
    #[serde(default = "default_domain_priorities")]
    pub domain_priorities: HashMap<String, i32>,
    #[serde(default = "default_tie_threshold")]
    pub contextual_tie_threshold: f64,
    #[serde(default = "default_disambiguation_ttl")]
    pub disambiguation_ttl_secs: i64,
    #[serde(default = "default_destructive_actions")]
    pub destructive_actions: Vec<String>,
    #[serde(default = "default_donations_dir")]
    pub donations_dir: String,
}

fn default_confidence_threshold() -> f32 {
    0.7
}

fn default_fallback_intent() -> String {
    "conversation.general".to_string()
}

fn default_domain_priorities() -> HashMap<String, i32> {
    HashMap::new()
}

fn default_tie_threshold() -> f64 {
    10.0
}

fn default_disambiguation_ttl() -> i64 {
    300
}

fn default_destructive_actions() -> Vec<String> {
    vec!["alarm.cancel_all".to_string(), "timer.cancel_all".to_string()]
}

fn default_donations_dir() -> String {
    "assets/donations".to_string()
}

impl Default for IntentSystemConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            fallback_intent: default_fallback_intent(),
            domain_priorities: default_domain_priorities(),
            contextual_tie_threshold: default_tie_threshold(),
            disambiguation_ttl_secs: default_disambiguation_ttl(),
            destructive_actions: default_destructive_actions(),
            donations_dir: default_donations_dir(),
        }
    }
}

/// VAD tunables (§4.4). Mirrors `core::traits::VADConfig` but as the on-disk, validated form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    #[serde(default = "default_vad_threshold")]
    pub threshold: f32,
    #[serde(default = "default_voice_frames")]
    pub voice_frames_required: u32,
    #[serde(default = "default_silence_frames")]
    pub silence_frames_required: u32,
    #[serde(default = "default_max_segment_s")]
    pub max_segment_duration_s: f32,
    #[serde(default)]
    pub auto_calibrate: bool,
}

fn default_vad_threshold() -> f32 {
    0.02
}
fn default_voice_frames() -> u32 {
    3
}
fn default_silence_frames() -> u32 {
    8
}
fn default_max_segment_s() -> f32 {
    30.0
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: default_vad_threshold(),
            voice_frames_required: default_voice_frames(),
            silence_frames_required: default_silence_frames(),
            max_segment_duration_s: default_max_segment_s(),
            auto_calibrate: false,
        }
    }
}

/// Resampling-cache tunables (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResamplingConfig {
    #[serde(default = "default_cache_size")]
    pub cache_max_entries: usize,
    #[serde(default = "default_resample_method")]
    pub default_method: String,
}

fn default_cache_size() -> usize {
    100
}

fn default_resample_method() -> String {
    "adaptive".to_string()
}

impl Default for ResamplingConfig {
    fn default() -> Self {
        Self {
            cache_max_entries: default_cache_size(),
            default_method: default_resample_method(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssetsConfig {
    #[serde(default = "default_assets_root")]
    pub root: String,
}

fn default_assets_root() -> String {
    "assets".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_max_audio_upload_bytes")]
    pub max_audio_upload_bytes: usize,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_max_audio_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_metrics_port() -> u16 {
    9090
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec!["/health".to_string(), "/metrics".to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            public_paths: default_public_paths(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_messages_per_second")]
    pub messages_per_second: u32,
    #[serde(default = "default_burst_multiplier")]
    pub burst_multiplier: f32,
}

fn default_messages_per_second() -> u32 {
    100
}

fn default_burst_multiplier() -> f32 {
    2.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            messages_per_second: default_messages_per_second(),
            burst_multiplier: default_burst_multiplier(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_ws_path() -> String {
    "/ws/conversation".to_string()
}
fn default_max_connections() -> usize {
    1000
}
fn default_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            max_connections: default_max_connections(),
            timeout_seconds: default_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig::default(),
            max_audio_upload_bytes: default_max_audio_upload_bytes(),
            metrics_port: default_metrics_port(),
        }
    }
}

/// Session-manager tunables (§4.6, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: i64,
    #[serde(default = "default_max_history")]
    pub max_history_turns: usize,
}

fn default_session_timeout() -> i64 {
    1800
}

fn default_max_history() -> usize {
    20
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout(),
            max_history_turns: default_max_history(),
        }
    }
}

/// Root of the configuration tree (§3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub inputs: InputsConfig,
    #[serde(default)]
    pub components: HashMap<String, ComponentConfig>,
    #[serde(default)]
    pub workflows: WorkflowsConfig,
    #[serde(default)]
    pub intent_system: IntentSystemConfig,
    #[serde(default)]
    pub vad: VadConfig,
    #[serde(default)]
    pub resampling: ResamplingConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

impl CoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component(&self, name: &str) -> Option<&ComponentConfig> {
        self.components.get(name)
    }

    pub fn component_enabled(&self, name: &str) -> bool {
        self.components.get(name).map(|c| c.enabled).unwrap_or(false)
    }
}

/// Load configuration from `config/default.toml`, an optional `config/{env}.toml` overlay, and
/// `VOICE_CORE__`-prefixed environment variables, in that priority order (lowest to highest).
/// TOML only — this workspace does not carry a YAML parser.
pub fn load_settings(env: Option<&str>) -> Result<CoreConfig, ConfigError> {
    use config::{Config, Environment, File};

    let mut builder = Config::builder();
    builder = builder.add_source(File::with_name("config/default").required(false));
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{env_name}")).required(false));
    }
    builder = builder.add_source(
        Environment::with_prefix("VOICE_CORE")
            .separator("__")
            .try_parsing(true),
    );

    let built = builder.build()?;
    let config: CoreConfig = built.try_deserialize()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = CoreConfig::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.workflows.unified_voice_assistant.asr_enabled);
        assert_eq!(config.intent_system.confidence_threshold, 0.7);
    }

    #[test]
    fn component_lookup_defaults_to_disabled() {
        let config = CoreConfig::default();
        assert!(!config.component_enabled("tts"));
    }
}
