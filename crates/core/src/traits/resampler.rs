//! `Resampler` — the contract the audio crate's concrete engines implement (§4.4).

use crate::audio::AudioData;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResamplerError {
    #[error("unsupported channel count for this method")]
    UnsupportedChannels,
    #[error("resampling math failed: {0}")]
    Failed(String),
}

/// The resampling methods selectable per use-case (§4.4). `Adaptive` defers the concrete choice
/// to the engine based on the rate ratio and use-case hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleMethod {
    Linear,
    Polyphase,
    SincKaiser,
    Adaptive,
}

/// A use-case hint an engine may use to pick a method under `Adaptive` (§4.4's "configuration
/// authority" rule: an explicit method always wins over this hint).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleUseCase {
    Asr,
    Playback,
    VoiceTrigger,
}

#[async_trait]
pub trait Resampler: Send + Sync {
    /// Resample `audio` to `target_rate`. Implementations must special-case
    /// `audio.sample_rate() == target_rate` as an identity transform returning the same bytes
    /// unchanged (§4.4, §8).
    async fn resample(
        &self,
        audio: &AudioData,
        target_rate: crate::audio::SampleRate,
        method: ResampleMethod,
        use_case: ResampleUseCase,
    ) -> Result<AudioData, ResamplerError>;

    fn engine_name(&self) -> &str;
}
