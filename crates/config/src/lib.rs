//! Configuration model and validator (§3, §4.9).
//!
//! Loads a strongly-typed [`CoreConfig`] tree from TOML files layered with environment variable
//! overrides, then validates it with [`validation::validate`] before anything else in the
//! runtime starts. Any validation error is fatal.

pub mod settings;
pub mod validation;

pub use settings::{
    AssetsConfig, AuthConfig, ComponentConfig, ContextConfig, CoreConfig, InputsConfig,
    IntentSystemConfig, RateLimitConfig, ResamplingConfig, RuntimeEnvironment, ServerConfig,
    SystemConfig, VadConfig, WorkflowStagesConfig, WorkflowsConfig, load_settings,
};
pub use validation::{
    validate, AvailableProviders, ValidationCategory, ValidationIssue, ValidationResult,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("configuration is invalid: {0} error(s)")]
    Invalid(usize),

    #[error("environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ValidationResult> for ConfigError {
    fn from(result: ValidationResult) -> Self {
        ConfigError::Invalid(result.errors.len())
    }
}
