//! Core traits shared across the workspace.
//!
//! # Trait Hierarchy
//!
//! ```text
//! Component lifecycle:
//!   - Component: pluggable service, initialized/shut down by the component manager
//!
//! Input:
//!   - InputSource: a text/audio origin multiplexed by the input manager
//!
//! Speech:
//!   - SpeechToText / TextToSpeech: provider interfaces
//!   - VoiceActivityDetector: speech segmentation
//!   - Resampler: sample-rate conversion
//!
//! Intents:
//!   - IntentHandler: domain plugin executing recognized intents
//!   - NluProvider: text-to-intent backend consumed by the recognizer
//!
//! Enrichment:
//!   - LanguageModel: optional best-effort LLM enrichment stage
//!
//! Wake word:
//!   - VoiceTrigger: the gate preceding VAD in the workflow pipeline
//! ```

mod component;
mod input_source;
mod intent_handler;
mod llm;
mod nlu;
mod resampler;
mod speech;
mod voice_trigger;

pub use component::{
    detect_deployment_profile, Component, ComponentError, DeploymentProfile, ProfileInputs,
    ServiceDependencyMap, ServiceName,
};
pub use input_source::{InputSource, InputSourceError, RawInput};
pub use intent_handler::{IntentHandler, IntentPattern};
pub use llm::{LanguageModel, LlmError};
pub use nlu::NluProvider;
pub use resampler::{ResampleMethod, ResampleUseCase, Resampler, ResamplerError};
pub use speech::{
    ProviderError, ProviderResult, SpeechToText, TextToSpeech, TranscriptResult, VADConfig,
    VADEvent, VADState, VoiceActivityDetector, VoiceConfig, VoiceInfo,
};
pub use voice_trigger::{VoiceTrigger, VoiceTriggerResult};
