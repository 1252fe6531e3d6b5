//! Audio data types shared across the pipeline.
//!
//! `AudioData` is the wire-adjacent, byte-oriented currency that flows between input sources,
//! the workflow engine, and the audio-processing crate. It intentionally stores samples as raw
//! bytes rather than normalized floats: several invariants (the identity-resample guarantee in
//! particular) are stated in terms of byte equality, and a byte payload is the representation
//! that is actually produced by input sources and consumed by providers.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Sample rates this core is prepared to reason about explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleRate {
    Hz8000,
    Hz16000,
    Hz22050,
    Hz44100,
    Hz48000,
    /// Any other rate a provider or device reports.
    Other(u32),
}

impl SampleRate {
    pub fn as_u32(self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8000,
            SampleRate::Hz16000 => 16000,
            SampleRate::Hz22050 => 22050,
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
            SampleRate::Other(hz) => hz,
        }
    }
}

impl From<u32> for SampleRate {
    fn from(hz: u32) -> Self {
        match hz {
            8000 => SampleRate::Hz8000,
            16000 => SampleRate::Hz16000,
            22050 => SampleRate::Hz22050,
            44100 => SampleRate::Hz44100,
            48000 => SampleRate::Hz48000,
            other => SampleRate::Other(other),
        }
    }
}

/// Audio channel configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Channels {
    #[default]
    Mono,
    Stereo,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Mono => 1,
            Channels::Stereo => 2,
        }
    }
}

/// Encoding tag carried on every `AudioData` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AudioEncoding {
    /// 16-bit signed PCM, little-endian. The default and the only encoding the VAD/resampling
    /// math in this crate understands directly.
    #[default]
    Pcm16,
    /// Anything else (opus, mu-law, ...); carried opaquely, not decoded by the core.
    Other(String),
}

impl AudioEncoding {
    pub fn tag(&self) -> &str {
        match self {
            AudioEncoding::Pcm16 => "pcm16",
            AudioEncoding::Other(s) => s.as_str(),
        }
    }
}

/// An immutable frame of audio: opaque bytes plus enough metadata to interpret them.
///
/// No mutation after creation — every transformation (resampling, normalization) produces a new
/// `AudioData` rather than editing one in place, so a frame handed to a downstream stage can
/// always be trusted to still mean what it meant when it was produced.
#[derive(Debug, Clone)]
pub struct AudioData {
    bytes: Bytes,
    timestamp: DateTime<Utc>,
    sample_rate: SampleRate,
    channels: Channels,
    encoding: AudioEncoding,
    metadata: HashMap<String, Value>,
}

impl AudioData {
    pub fn new(bytes: impl Into<Bytes>, sample_rate: SampleRate, channels: Channels) -> Self {
        Self {
            bytes: bytes.into(),
            timestamp: Utc::now(),
            sample_rate,
            channels,
            encoding: AudioEncoding::default(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_encoding(mut self, encoding: AudioEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn encoding(&self) -> &AudioEncoding {
        &self.encoding
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// A copy carrying the same bytes under new rate/metadata — used by the identity-resample
    /// path (§4.4: `src == tgt` is a metadata-only transform, never a byte copy of the payload).
    pub fn stamped_copy(&self) -> Self {
        self.clone()
    }

    /// Interpret the payload as little-endian 16-bit PCM samples. Returns an empty vec for any
    /// other encoding — callers that need a different encoding decode it themselves.
    pub fn samples_i16(&self) -> Vec<i16> {
        if !matches!(self.encoding, AudioEncoding::Pcm16) {
            return Vec::new();
        }
        self.bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    pub fn sample_count(&self) -> usize {
        match self.encoding {
            AudioEncoding::Pcm16 => self.bytes.len() / 2,
            AudioEncoding::Other(_) => 0,
        }
    }

    pub fn duration(&self) -> Duration {
        let frames = self.sample_count() / self.channels.count().max(1);
        Duration::from_secs_f64(frames as f64 / self.sample_rate.as_u32().max(1) as f64)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration().as_millis() as u64
    }
}

/// A VAD-emitted aggregate: the ordered frames making up a single detected utterance.
#[derive(Debug, Clone)]
pub struct VoiceSegment {
    frames: Vec<AudioData>,
    started_at: DateTime<Utc>,
}

impl VoiceSegment {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            frames: Vec::new(),
            started_at,
        }
    }

    pub fn push(&mut self, frame: AudioData) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[AudioData] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|f| f.duration()).sum()
    }

    /// Concatenate all frames' payloads into a single `AudioData`, carrying the first frame's
    /// rate/channels/encoding (frames within one segment share those by construction).
    pub fn combined_audio(&self) -> Option<AudioData> {
        let first = self.frames.first()?;
        let mut combined = Vec::with_capacity(self.frames.iter().map(|f| f.len()).sum());
        for frame in &self.frames {
            combined.extend_from_slice(frame.bytes());
        }
        Some(
            AudioData::new(combined, first.sample_rate(), first.channels())
                .with_encoding(first.encoding().clone())
                .with_metadata("voice_duration_ms", self.total_duration().as_millis() as u64),
        )
    }

    /// Scale PCM16 samples so their RMS matches `target_rms` (a fraction of full scale, e.g.
    /// `0.2`). Silence (RMS == 0) is returned unchanged rather than amplifying noise floor to
    /// infinity.
    pub fn normalize_for_asr(&self, target_rms: f32) -> Option<AudioData> {
        let combined = self.combined_audio()?;
        let samples = combined.samples_i16();
        if samples.is_empty() {
            return Some(combined);
        }
        let rms = rms_energy(&samples);
        if rms <= f32::EPSILON {
            return Some(combined);
        }
        let gain = (target_rms * 32768.0) / (rms * 32768.0);
        let scaled: Vec<u8> = samples
            .iter()
            .flat_map(|&s| {
                let v = (s as f32 * gain).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                v.to_le_bytes()
            })
            .collect();
        Some(
            AudioData::new(scaled, combined.sample_rate(), combined.channels())
                .with_encoding(combined.encoding().clone())
                .with_metadata("normalized_for_asr", true),
        )
    }
}

/// Normalized RMS energy over 16-bit samples, in `[0, 1]` (clamped). Grounded on
/// `calculate_audio_energy` in the original implementation: `sqrt(mean(s^2)) / 32768`.
pub fn rms_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt() / 32768.0;
    rms.clamp(0.0, 1.0) as f32
}

/// Zero-crossing rate, an auxiliary VAD feature.
pub fn zero_crossing_rate(samples: &[i16]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0) != (w[1] >= 0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

/// Volume normalization that is idempotent: applying it twice must equal applying it once
/// (§8's round-trip property). Implemented by clamping into `[0.0, 1.0]` — a value already in
/// range passes through unchanged, so a second application is a no-op.
pub fn normalize_volume(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_roundtrip() {
        assert_eq!(SampleRate::from(16000).as_u32(), 16000);
        assert_eq!(SampleRate::from(12345).as_u32(), 12345);
    }

    #[test]
    fn audio_data_duration() {
        let bytes = vec![0u8; 320]; // 160 i16 samples = 10ms @ 16kHz mono
        let data = AudioData::new(bytes, SampleRate::Hz16000, Channels::Mono);
        assert_eq!(data.duration_ms(), 10);
    }

    #[test]
    fn rms_energy_silence_and_full_scale() {
        let silence = vec![0i16; 100];
        assert_eq!(rms_energy(&silence), 0.0);

        let full_scale = vec![i16::MAX; 100];
        assert!(rms_energy(&full_scale) > 0.9);
    }

    #[test]
    fn normalize_volume_is_idempotent() {
        for v in [-1.0f32, 0.0, 0.3, 1.0, 2.5] {
            let once = normalize_volume(v);
            let twice = normalize_volume(once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn voice_segment_combines_frames_preserving_bytes() {
        let mut seg = VoiceSegment::new(Utc::now());
        seg.push(AudioData::new(vec![1, 2], SampleRate::Hz16000, Channels::Mono));
        seg.push(AudioData::new(vec![3, 4], SampleRate::Hz16000, Channels::Mono));
        let combined = seg.combined_audio().unwrap();
        assert_eq!(combined.bytes().as_ref(), &[1, 2, 3, 4]);
    }
}
