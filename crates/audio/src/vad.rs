//! RMS-energy voice activity detector (§4.4).
//!
//! Mirrors the teacher's `magicnet` VAD in shape — one `Mutex`-guarded mutable-state struct, an
//! exhaustive `match (state, is_speech)` transition table — but drops the neural (ONNX) energy
//! estimator entirely in favour of the plain RMS-energy computation `core::audio::rms_energy`
//! already provides, since this runtime has no model-serving Non-goal exemption to work around.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::time::Instant;

use voice_core::audio::rms_energy;
use voice_core::traits::{VADConfig, VADEvent, VADState, VoiceActivityDetector};
use voice_core::AudioData;

struct MutableState {
    state: VADState,
    voice_frames: u32,
    silence_frames: u32,
    segment_started_at: Option<Instant>,
}

impl Default for MutableState {
    fn default() -> Self {
        Self {
            state: VADState::Silence,
            voice_frames: 0,
            silence_frames: 0,
            segment_started_at: None,
        }
    }
}

/// RMS-energy hysteretic VAD. Thread-safe: every transition runs under a single lock, so a
/// detector can be shared across an `Arc` without any of its four counters drifting out of sync.
pub struct RmsVad {
    config: VADConfig,
    state: Mutex<MutableState>,
}

impl RmsVad {
    pub fn new(config: VADConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MutableState::default()),
        }
    }

    /// Feed one frame's energy through the state machine. Pure with respect to `self.config`;
    /// all mutation is confined to the single lock.
    fn update_state(&self, energy: f32) -> VADEvent {
        let is_speech = energy >= self.config.threshold;
        let mut s = self.state.lock();

        let event = match (s.state, is_speech) {
            (VADState::Silence, false) => VADEvent::Silence,
            (VADState::Silence, true) => {
                s.voice_frames = 1;
                if s.voice_frames >= self.config.voice_frames_required {
                    s.state = VADState::Voice;
                    s.silence_frames = 0;
                    s.segment_started_at = Some(Instant::now());
                    VADEvent::SegmentStart
                } else {
                    s.state = VADState::CandidateVoice;
                    VADEvent::Silence
                }
            }
            (VADState::CandidateVoice, true) => {
                s.voice_frames += 1;
                if s.voice_frames >= self.config.voice_frames_required {
                    s.state = VADState::Voice;
                    s.silence_frames = 0;
                    s.segment_started_at = Some(Instant::now());
                    VADEvent::SegmentStart
                } else {
                    VADEvent::Silence
                }
            }
            (VADState::CandidateVoice, false) => {
                s.state = VADState::Silence;
                s.voice_frames = 0;
                VADEvent::Silence
            }
            (VADState::Voice, true) => {
                s.silence_frames = 0;
                if self.segment_overran(&s) {
                    s.state = VADState::Silence;
                    s.voice_frames = 0;
                    s.segment_started_at = None;
                    VADEvent::SegmentEnd
                } else {
                    VADEvent::SegmentContinue { energy }
                }
            }
            (VADState::Voice, false) => {
                s.state = VADState::CandidateSilence;
                s.silence_frames = 1;
                VADEvent::SegmentContinue { energy }
            }
            (VADState::CandidateSilence, false) => {
                s.silence_frames += 1;
                if s.silence_frames >= self.config.silence_frames_required {
                    s.state = VADState::Silence;
                    s.voice_frames = 0;
                    s.segment_started_at = None;
                    VADEvent::SegmentEnd
                } else {
                    VADEvent::SegmentContinue { energy }
                }
            }
            (VADState::CandidateSilence, true) => {
                s.state = VADState::Voice;
                s.silence_frames = 0;
                VADEvent::SegmentContinue { energy }
            }
        };
        event
    }

    fn segment_overran(&self, s: &MutableState) -> bool {
        match s.segment_started_at {
            Some(started) => started.elapsed().as_secs_f32() >= self.config.max_segment_duration_s,
            None => false,
        }
    }
}

#[async_trait]
impl VoiceActivityDetector for RmsVad {
    async fn process_frame(&self, audio: &AudioData) -> VADEvent {
        let samples = audio.samples_i16();
        let energy = rms_energy(&samples);
        self.update_state(energy)
    }

    fn process_stream<'a>(
        &'a self,
        audio_stream: Pin<Box<dyn Stream<Item = AudioData> + Send + 'a>>,
        _config: &'a VADConfig,
    ) -> Pin<Box<dyn Stream<Item = VADEvent> + Send + 'a>> {
        Box::pin(audio_stream.then(move |audio| async move { self.process_frame(&audio).await }))
    }

    fn reset(&self) {
        *self.state.lock() = MutableState::default();
    }

    fn current_state(&self) -> VADState {
        self.state.lock().state
    }

    fn engine_name(&self) -> &str {
        "rms-energy"
    }
}

/// Estimate a workable VAD threshold from a batch of frames, typically recorded during a short
/// silence-calibration window at startup. Ported algorithm-for-algorithm from the original's
/// `estimate_optimal_vad_threshold`: take the `noise_percentile`th energy as the noise floor and
/// scale it by `voice_multiplier`, clamped to a sane range.
pub fn estimate_optimal_vad_threshold(
    frames: &[AudioData],
    noise_percentile: u8,
    voice_multiplier: f32,
) -> f32 {
    const DEFAULT_THRESHOLD: f32 = 0.01;
    const MIN_THRESHOLD: f32 = 0.001;
    const MAX_THRESHOLD: f32 = 0.1;

    if frames.is_empty() {
        return DEFAULT_THRESHOLD;
    }

    let mut energies: Vec<f32> = frames
        .iter()
        .map(|f| rms_energy(&f.samples_i16()))
        .filter(|&e| e > 0.0)
        .collect();

    if energies.is_empty() {
        return DEFAULT_THRESHOLD;
    }

    energies.sort_by(|a, b| a.partial_cmp(b).expect("rms_energy never returns NaN"));
    let index = (energies.len() * noise_percentile as usize) / 100;
    let noise_floor = energies[index.min(energies.len() - 1)];

    (noise_floor * voice_multiplier).clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_core::audio::{Channels, SampleRate};

    fn silent_frame() -> AudioData {
        AudioData::new(vec![0u8; 640], SampleRate::Hz16000, Channels::Mono)
    }

    fn loud_frame() -> AudioData {
        let samples = vec![20000i16; 320];
        let mut bytes = Vec::with_capacity(640);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        AudioData::new(bytes, SampleRate::Hz16000, Channels::Mono)
    }

    #[tokio::test]
    async fn hysteresis_requires_consecutive_voice_frames_before_segment_start() {
        let config = VADConfig {
            threshold: 0.1,
            voice_frames_required: 3,
            silence_frames_required: 2,
            max_segment_duration_s: 30.0,
        };
        let vad = RmsVad::new(config);
        let loud = loud_frame();

        assert_eq!(vad.process_frame(&loud).await, VADEvent::Silence);
        assert_eq!(vad.current_state(), VADState::CandidateVoice);
        assert_eq!(vad.process_frame(&loud).await, VADEvent::Silence);
        assert_eq!(vad.process_frame(&loud).await, VADEvent::SegmentStart);
        assert_eq!(vad.current_state(), VADState::Voice);
    }

    #[tokio::test]
    async fn silence_after_voice_requires_consecutive_silence_frames_before_segment_end() {
        let config = VADConfig {
            threshold: 0.1,
            voice_frames_required: 1,
            silence_frames_required: 2,
            max_segment_duration_s: 30.0,
        };
        let vad = RmsVad::new(config);
        let loud = loud_frame();
        let silent = silent_frame();

        assert_eq!(vad.process_frame(&loud).await, VADEvent::SegmentStart);
        assert!(matches!(
            vad.process_frame(&silent).await,
            VADEvent::SegmentContinue { .. }
        ));
        assert_eq!(vad.current_state(), VADState::CandidateSilence);
        assert_eq!(vad.process_frame(&silent).await, VADEvent::SegmentEnd);
        assert_eq!(vad.current_state(), VADState::Silence);
    }

    #[tokio::test]
    async fn candidate_silence_returns_to_voice_on_renewed_speech() {
        let config = VADConfig {
            threshold: 0.1,
            voice_frames_required: 1,
            silence_frames_required: 5,
            max_segment_duration_s: 30.0,
        };
        let vad = RmsVad::new(config);
        let loud = loud_frame();
        let silent = silent_frame();

        vad.process_frame(&loud).await;
        vad.process_frame(&silent).await;
        assert_eq!(vad.current_state(), VADState::CandidateSilence);
        vad.process_frame(&loud).await;
        assert_eq!(vad.current_state(), VADState::Voice);
    }

    #[test]
    fn threshold_estimation_scales_noise_floor_and_clamps() {
        let frames: Vec<AudioData> = (0..10).map(|_| silent_frame()).collect();
        let threshold = estimate_optimal_vad_threshold(&frames, 15, 3.0);
        assert!(threshold >= 0.001);
    }

    #[test]
    fn threshold_estimation_falls_back_to_default_with_no_frames() {
        assert_eq!(estimate_optimal_vad_threshold(&[], 15, 3.0), 0.01);
    }
}
