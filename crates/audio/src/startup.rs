//! Cross-component sample-rate/channel coherence check (§4.4, §4.9).
//!
//! Ported from the original's `validate_cross_component_compatibility` /
//! `validate_startup_audio_configuration`: the microphone, ASR, and voice-trigger stages each
//! declare a sample rate and channel count, and this check flags mismatches the resampling layer
//! cannot or should not paper over.

use serde::{Deserialize, Serialize};

/// One component's declared audio requirements.
#[derive(Debug, Clone, Copy)]
pub struct AudioComponentSpec {
    pub sample_rate_hz: u32,
    pub channels: u8,
    pub allow_resampling: bool,
}

impl Default for AudioComponentSpec {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16000,
            channels: 1,
            allow_resampling: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioCompatibilityReport {
    pub compatible: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Check the microphone's declared rate/channels against what ASR and voice-trigger expect.
/// A component with `allow_resampling: false` that disagrees with the microphone is a fatal
/// mismatch; everything else is a warning plus a recommendation.
pub fn validate_cross_component_compatibility(
    microphone: AudioComponentSpec,
    asr: AudioComponentSpec,
    voice_trigger: AudioComponentSpec,
) -> AudioCompatibilityReport {
    let mut report = AudioCompatibilityReport {
        compatible: true,
        errors: Vec::new(),
        warnings: Vec::new(),
        recommendations: Vec::new(),
    };

    let rates_differ = microphone.sample_rate_hz != asr.sample_rate_hz
        || microphone.sample_rate_hz != voice_trigger.sample_rate_hz;

    if rates_differ {
        report.warnings.push(format!(
            "sample rate mismatch — mic: {}Hz, asr: {}Hz, voice_trigger: {}Hz",
            microphone.sample_rate_hz, asr.sample_rate_hz, voice_trigger.sample_rate_hz
        ));

        if !asr.allow_resampling && asr.sample_rate_hz != microphone.sample_rate_hz {
            report.errors.push(format!(
                "asr requires {}Hz but microphone provides {}Hz with resampling disabled",
                asr.sample_rate_hz, microphone.sample_rate_hz
            ));
            report.compatible = false;
        }
        if !voice_trigger.allow_resampling && voice_trigger.sample_rate_hz != microphone.sample_rate_hz {
            report.errors.push(format!(
                "voice_trigger requires {}Hz but microphone provides {}Hz with resampling disabled",
                voice_trigger.sample_rate_hz, microphone.sample_rate_hz
            ));
            report.compatible = false;
        }

        if report.compatible {
            report
                .recommendations
                .push("consider standardizing sample rates across components".to_string());
        }
    }

    if microphone.channels != asr.channels {
        report.warnings.push(format!(
            "channel mismatch — mic: {}, asr expects: {}",
            microphone.channels, asr.channels
        ));
    }
    if microphone.channels != voice_trigger.channels {
        report.warnings.push(format!(
            "channel mismatch — mic: {}, voice_trigger expects: {}",
            microphone.channels, voice_trigger.channels
        ));
    }

    report
}

/// Fatal range check applied to every component's declared sample rate/channels before the
/// cross-component comparison runs.
pub fn validate_component_ranges(name: &str, spec: AudioComponentSpec) -> Vec<String> {
    let mut errors = Vec::new();
    if !(8000..=192_000).contains(&spec.sample_rate_hz) {
        errors.push(format!(
            "{name}: invalid sample rate {}Hz (must be 8000-192000Hz)",
            spec.sample_rate_hz
        ));
    }
    if !(1..=8).contains(&spec.channels) {
        errors.push(format!(
            "{name}: invalid channel count {} (must be 1-8)",
            spec.channels
        ));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_specs_are_fully_compatible() {
        let spec = AudioComponentSpec::default();
        let report = validate_cross_component_compatibility(spec, spec, spec);
        assert!(report.compatible);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn mismatched_rate_with_resampling_disabled_is_fatal() {
        let mic = AudioComponentSpec::default();
        let asr = AudioComponentSpec {
            sample_rate_hz: 8000,
            allow_resampling: false,
            ..AudioComponentSpec::default()
        };
        let report = validate_cross_component_compatibility(mic, asr, AudioComponentSpec::default());
        assert!(!report.compatible);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn mismatched_rate_with_resampling_allowed_is_only_a_warning() {
        let mic = AudioComponentSpec::default();
        let asr = AudioComponentSpec {
            sample_rate_hz: 8000,
            ..AudioComponentSpec::default()
        };
        let report = validate_cross_component_compatibility(mic, asr, AudioComponentSpec::default());
        assert!(report.compatible);
        assert!(!report.warnings.is_empty());
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn out_of_range_sample_rate_is_rejected() {
        let spec = AudioComponentSpec {
            sample_rate_hz: 200_000,
            ..AudioComponentSpec::default()
        };
        assert_eq!(validate_component_ranges("asr", spec).len(), 1);
    }
}
