//! Speech processing traits: `SpeechToText`, `TextToSpeech`, `VoiceActivityDetector` (§4.7).
//!
//! These are the provider-facing abstractions a domain component coordinates (§4.7's "Provider
//! discovery & filtering", "Default + fallback chain"); concrete engines are out of scope for
//! this core (§1) and live behind these traits.

use crate::audio::AudioData;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A transcription result returned by a `SpeechToText` provider.
#[derive(Debug, Clone, Default)]
pub struct TranscriptResult {
    pub text: String,
    pub confidence: f32,
    pub is_final: bool,
    pub language: Option<String>,
}

/// A synthesizable voice exposed by a `TextToSpeech` provider.
#[derive(Debug, Clone)]
pub struct VoiceInfo {
    pub id: String,
    pub language: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct VoiceConfig {
    pub voice_id: Option<String>,
    pub language: String,
    pub speed: f32,
}

/// Speech-to-text provider interface.
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    async fn transcribe(&self, audio: &AudioData) -> ProviderResult<TranscriptResult>;

    fn transcribe_stream<'a>(
        &'a self,
        audio_stream: Pin<Box<dyn Stream<Item = AudioData> + Send + 'a>>,
    ) -> Pin<Box<dyn Stream<Item = ProviderResult<TranscriptResult>> + Send + 'a>>;

    /// Sample rates this provider can consume directly, most preferred first (§4.7).
    fn get_preferred_sample_rates(&self) -> &[u32];

    fn supports_sample_rate(&self, hz: u32) -> bool {
        self.get_preferred_sample_rates().contains(&hz)
    }

    /// Clear any internal state (inter-utterance contamination guard, §4.7).
    async fn reset(&self, language: Option<&str>);

    fn provider_name(&self) -> &str;
}

/// Text-to-speech provider interface.
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    async fn synthesize(&self, text: &str, config: &VoiceConfig) -> ProviderResult<AudioData>;

    fn synthesize_stream<'a>(
        &'a self,
        text_stream: Pin<Box<dyn Stream<Item = String> + Send + 'a>>,
        config: &'a VoiceConfig,
    ) -> Pin<Box<dyn Stream<Item = ProviderResult<AudioData>> + Send + 'a>>;

    fn available_voices(&self) -> &[VoiceInfo];

    fn provider_name(&self) -> &str;

    fn default_voice(&self, language: &str) -> Option<&VoiceInfo> {
        self.available_voices().iter().find(|v| v.language == language)
    }
}

/// VAD configuration (§4.4): thresholds and hysteresis window sizes for the state machine below.
#[derive(Debug, Clone)]
pub struct VADConfig {
    pub threshold: f32,
    pub voice_frames_required: u32,
    pub silence_frames_required: u32,
    pub max_segment_duration_s: f32,
}

impl Default for VADConfig {
    fn default() -> Self {
        Self {
            threshold: 0.02,
            voice_frames_required: 3,
            silence_frames_required: 8,
            max_segment_duration_s: 30.0,
        }
    }
}

/// The four hysteretic VAD states from §4.4, shared between the abstract trait and any concrete
/// engine implementing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VADState {
    #[default]
    Silence,
    CandidateVoice,
    Voice,
    CandidateSilence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VADEvent {
    SegmentStart,
    SegmentContinue { energy: f32 },
    SegmentEnd,
    Silence,
}

impl VADEvent {
    pub fn is_speech(&self) -> bool {
        matches!(self, Self::SegmentStart | Self::SegmentContinue { .. })
    }
}

/// Voice activity detector interface. The concrete RMS-energy engine satisfying §4.4's exact
/// algorithm lives in the `audio` crate; this trait is what domain components program against.
#[async_trait]
pub trait VoiceActivityDetector: Send + Sync + 'static {
    async fn process_frame(&self, audio: &AudioData) -> VADEvent;

    fn process_stream<'a>(
        &'a self,
        audio_stream: Pin<Box<dyn Stream<Item = AudioData> + Send + 'a>>,
        config: &'a VADConfig,
    ) -> Pin<Box<dyn Stream<Item = VADEvent> + Send + 'a>>;

    fn reset(&self);

    fn current_state(&self) -> VADState;

    fn engine_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Channels, SampleRate};

    struct MockStt {
        rates: Vec<u32>,
    }

    #[async_trait]
    impl SpeechToText for MockStt {
        async fn transcribe(&self, _audio: &AudioData) -> ProviderResult<TranscriptResult> {
            Ok(TranscriptResult {
                text: "test transcription".to_string(),
                confidence: 0.95,
                is_final: true,
                language: Some("en".to_string()),
            })
        }

        fn transcribe_stream<'a>(
            &'a self,
            _audio_stream: Pin<Box<dyn Stream<Item = AudioData> + Send + 'a>>,
        ) -> Pin<Box<dyn Stream<Item = ProviderResult<TranscriptResult>> + Send + 'a>> {
            Box::pin(futures::stream::empty())
        }

        fn get_preferred_sample_rates(&self) -> &[u32] {
            &self.rates
        }

        async fn reset(&self, _language: Option<&str>) {}

        fn provider_name(&self) -> &str {
            "mock-stt"
        }
    }

    #[tokio::test]
    async fn mock_stt_transcribes_and_reports_rates() {
        let stt = MockStt { rates: vec![16000] };
        let audio = AudioData::new(vec![0u8; 320], SampleRate::Hz16000, Channels::Mono);
        let result = stt.transcribe(&audio).await.unwrap();
        assert_eq!(result.text, "test transcription");
        assert!(stt.supports_sample_rate(16000));
        assert!(!stt.supports_sample_rate(44100));
    }
}
