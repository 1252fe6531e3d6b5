//! RMS-energy VAD and rubato-backed resampling (§4.4).
//!
//! Concrete engines satisfying `voice_core::traits::{VoiceActivityDetector, Resampler}`. Neither
//! trait is implemented here for a model-serving backend — the assistant's speech segmentation is
//! energy-based end to end, not neural, per the runtime's scope.

mod cache;
mod resampler;
mod startup;
mod vad;

pub use cache::{CacheKey, ResamplingCache};
pub use resampler::{resolve_adaptive_method, RubatoAudioResampler};
pub use startup::{
    validate_component_ranges, validate_cross_component_compatibility, AudioCompatibilityReport,
    AudioComponentSpec,
};
pub use vad::{estimate_optimal_vad_threshold, RmsVad};
