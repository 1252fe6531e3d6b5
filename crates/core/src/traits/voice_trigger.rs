//! `VoiceTrigger` — the wake-word gate that precedes VAD in the pipeline (§4.3 "Voice trigger",
//! §4.7). Concrete engines are out of scope for this core; this is the seam a domain component
//! discovers providers behind.

use async_trait::async_trait;

use crate::audio::AudioData;

use super::speech::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceTriggerResult {
    pub detected: bool,
    pub confidence: f32,
}

#[async_trait]
pub trait VoiceTrigger: Send + Sync + 'static {
    async fn detect(&self, audio: &AudioData) -> Result<VoiceTriggerResult, ProviderError>;

    /// True when the provider resamples internally, letting the component skip external
    /// resampling for this stage (§4.7's "Voice trigger additionally supports internal
    /// resampling").
    fn supports_resampling(&self) -> bool {
        false
    }

    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Channels, SampleRate};

    struct AlwaysDetects;

    #[async_trait]
    impl VoiceTrigger for AlwaysDetects {
        async fn detect(&self, _audio: &AudioData) -> Result<VoiceTriggerResult, ProviderError> {
            Ok(VoiceTriggerResult { detected: true, confidence: 0.95 })
        }

        fn provider_name(&self) -> &str {
            "always-detects"
        }
    }

    #[tokio::test]
    async fn detect_reports_confidence() {
        let trigger = AlwaysDetects;
        let audio = AudioData::new(vec![0u8; 640], SampleRate::Hz16000, Channels::Mono);
        let result = trigger.detect(&audio).await.unwrap();
        assert!(result.detected);
        assert_eq!(result.confidence, 0.95);
        assert!(!trigger.supports_resampling());
    }
}
