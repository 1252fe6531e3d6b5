//! Rubato-backed `Resampler` (§4.4).
//!
//! Method selection mirrors the original's `AudioProcessor.get_optimal_conversion_path`: under
//! `Adaptive`, the use-case hint and the rate ratio choose the engine, never the other way round
//! — an explicit `ResampleMethod` always wins (§4.4's "configuration authority" rule), this
//! function only ever runs when the caller asked for `Adaptive`.

use async_trait::async_trait;
use rubato::{Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use std::sync::Arc;
use tracing::debug;

use voice_core::audio::{AudioEncoding, Channels, SampleRate};
use voice_core::traits::{ResampleMethod, ResampleUseCase, Resampler, ResamplerError};
use voice_core::AudioData;

use crate::cache::{CacheKey, ResamplingCache};

/// Resolve `Adaptive` to a concrete method given the rate ratio and use-case hint.
pub fn resolve_adaptive_method(src_rate: u32, tgt_rate: u32, use_case: ResampleUseCase) -> ResampleMethod {
    if src_rate == tgt_rate {
        return ResampleMethod::Linear;
    }
    let ratio = (src_rate.max(tgt_rate) as f64) / (src_rate.min(tgt_rate) as f64);
    match use_case {
        ResampleUseCase::VoiceTrigger => {
            if ratio <= 2.0 {
                ResampleMethod::Linear
            } else {
                ResampleMethod::Polyphase
            }
        }
        ResampleUseCase::Asr => {
            if ratio <= 1.5 {
                ResampleMethod::SincKaiser
            } else {
                ResampleMethod::Polyphase
            }
        }
        ResampleUseCase::Playback => ResampleMethod::Polyphase,
    }
}

fn sinc_params(quality: SincInterpolationType) -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: quality,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Linear interpolation over i16 PCM samples — the fast path for small or latency-sensitive
/// conversions, matching the original's `_basic_resample_bytes` fallback.
fn linear_resample(samples: &[i16], src_rate: u32, tgt_rate: u32) -> Vec<i16> {
    if samples.is_empty() || src_rate == tgt_rate {
        return samples.to_vec();
    }
    let ratio = tgt_rate as f64 / src_rate as f64;
    let new_len = ((samples.len() as f64) * ratio).round() as usize;
    let mut out = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src_pos = i as f64 / ratio;
        let lo = src_pos.floor() as usize;
        let hi = (lo + 1).min(samples.len() - 1);
        let frac = src_pos - lo as f64;
        let lo_val = samples[lo.min(samples.len() - 1)] as f64;
        let hi_val = samples[hi] as f64;
        out.push((lo_val + (hi_val - lo_val) * frac).round() as i16);
    }
    out
}

fn sinc_resample(
    samples: &[i16],
    src_rate: u32,
    tgt_rate: u32,
    channels: usize,
    quality: SincInterpolationType,
) -> Result<Vec<i16>, ResamplerError> {
    let floats: Vec<f64> = samples.iter().map(|&s| s as f64 / 32768.0).collect();
    let frames = floats.len() / channels.max(1);
    let mut deinterleaved: Vec<Vec<f64>> = vec![Vec::with_capacity(frames); channels.max(1)];
    for (i, sample) in floats.iter().enumerate() {
        deinterleaved[i % channels.max(1)].push(*sample);
    }

    let mut resampler = SincFixedIn::<f64>::new(
        tgt_rate as f64 / src_rate as f64,
        2.0,
        sinc_params(quality),
        frames.max(1),
        channels.max(1),
    )
    .map_err(|e| ResamplerError::Failed(e.to_string()))?;

    let output = resampler
        .process(&deinterleaved, None)
        .map_err(|e| ResamplerError::Failed(e.to_string()))?;

    let out_frames = output.first().map(|c| c.len()).unwrap_or(0);
    let mut interleaved = Vec::with_capacity(out_frames * channels.max(1));
    for frame in 0..out_frames {
        for ch in output.iter() {
            let sample = (ch[frame] * 32767.0).clamp(i16::MIN as f64, i16::MAX as f64);
            interleaved.push(sample as i16);
        }
    }
    Ok(interleaved)
}

fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// Resampling engine used by the ASR, playback, and voice-trigger stages. Caches the result of
/// every non-identity conversion keyed on the first 1KB of the source payload (§4.4, §8).
pub struct RubatoAudioResampler {
    cache: Arc<ResamplingCache>,
}

impl RubatoAudioResampler {
    pub fn new(cache_max_entries: usize) -> Self {
        Self {
            cache: Arc::new(ResamplingCache::new(cache_max_entries)),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl Resampler for RubatoAudioResampler {
    async fn resample(
        &self,
        audio: &AudioData,
        target_rate: SampleRate,
        method: ResampleMethod,
        use_case: ResampleUseCase,
    ) -> Result<AudioData, ResamplerError> {
        let src_rate = audio.sample_rate().as_u32();
        let tgt_rate = target_rate.as_u32();

        if src_rate == tgt_rate {
            return Ok(audio
                .clone()
                .with_metadata("resampling_applied", false)
                .with_metadata("original_sample_rate", src_rate));
        }

        let channels = audio.channels();
        let resolved = match method {
            ResampleMethod::Adaptive => resolve_adaptive_method(src_rate, tgt_rate, use_case),
            other => other,
        };

        let key = CacheKey::new(audio.bytes(), src_rate, tgt_rate, channels, resolved);
        if let Some(cached) = self.cache.get(&key) {
            debug!(src_rate, tgt_rate, method = ?resolved, "resampling cache hit");
            return Ok(AudioData::new(cached, target_rate, channels)
                .with_encoding(AudioEncoding::Pcm16)
                .with_timestamp(audio.timestamp())
                .with_metadata("resampling_applied", true)
                .with_metadata("original_sample_rate", src_rate)
                .with_metadata("cache_hit", true));
        }

        let samples = audio.samples_i16();
        let resampled = match resolved {
            ResampleMethod::Linear => linear_resample(&samples, src_rate, tgt_rate),
            ResampleMethod::Polyphase => {
                sinc_resample(&samples, src_rate, tgt_rate, channels.count(), SincInterpolationType::Linear)?
            }
            ResampleMethod::SincKaiser => {
                sinc_resample(&samples, src_rate, tgt_rate, channels.count(), SincInterpolationType::Cubic)?
            }
            ResampleMethod::Adaptive => unreachable!("resolved above"),
        };
        let bytes = samples_to_le_bytes(&resampled);

        self.cache.insert(key, bytes.clone());

        Ok(AudioData::new(bytes, target_rate, channels)
            .with_encoding(AudioEncoding::Pcm16)
            .with_timestamp(audio.timestamp())
            .with_metadata("resampling_applied", true)
            .with_metadata("original_sample_rate", src_rate)
            .with_metadata("resampling_method", format!("{resolved:?}"))
            .with_metadata("cache_hit", false))
    }

    fn engine_name(&self) -> &str {
        "rubato"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_core::audio::Channels;

    fn tone(samples: usize) -> AudioData {
        let mut bytes = Vec::with_capacity(samples * 2);
        for i in 0..samples {
            let v = ((i as f32 * 0.3).sin() * 10000.0) as i16;
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        AudioData::new(bytes, SampleRate::Hz16000, Channels::Mono)
    }

    #[tokio::test]
    async fn identity_rate_is_byte_identical() {
        let engine = RubatoAudioResampler::new(10);
        let audio = tone(320);
        let original_bytes = audio.bytes().clone();
        let result = engine
            .resample(&audio, SampleRate::Hz16000, ResampleMethod::Linear, ResampleUseCase::Asr)
            .await
            .unwrap();
        assert_eq!(result.bytes(), &original_bytes);
    }

    #[tokio::test]
    async fn downsampling_halves_sample_count_for_linear_method() {
        let engine = RubatoAudioResampler::new(10);
        let audio = tone(320);
        let result = engine
            .resample(&audio, SampleRate::Hz8000, ResampleMethod::Linear, ResampleUseCase::VoiceTrigger)
            .await
            .unwrap();
        assert_eq!(result.sample_count(), 160);
    }

    #[tokio::test]
    async fn repeated_conversion_is_served_from_cache() {
        let engine = RubatoAudioResampler::new(10);
        let audio = tone(320);
        engine
            .resample(&audio, SampleRate::Hz8000, ResampleMethod::Linear, ResampleUseCase::Asr)
            .await
            .unwrap();
        assert_eq!(engine.cache_len(), 1);
        let second = engine
            .resample(&audio, SampleRate::Hz8000, ResampleMethod::Linear, ResampleUseCase::Asr)
            .await
            .unwrap();
        assert_eq!(second.metadata().get("cache_hit").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn adaptive_resolution_prefers_linear_for_small_voice_trigger_ratios() {
        assert_eq!(
            resolve_adaptive_method(16000, 8000, ResampleUseCase::VoiceTrigger),
            ResampleMethod::Linear
        );
    }

    #[test]
    fn adaptive_resolution_prefers_sinc_kaiser_for_small_asr_ratios() {
        assert_eq!(
            resolve_adaptive_method(16000, 22050, ResampleUseCase::Asr),
            ResampleMethod::SincKaiser
        );
    }
}
