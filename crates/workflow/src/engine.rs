//! `WorkflowEngine` — the nine-stage pipeline (§4.3): voice trigger, VAD, ASR, text processing,
//! NLU, intent execution, LLM enrichment, TTS, audio output.
//!
//! Generalized from the donor's `VoicePipeline` (`crates/pipeline/src/orchestrator.rs`): the
//! builder-with-optional-stages shape (`with_llm`, `with_text_processor`, ...) and the
//! stage-sequencing idea survive; the donor's ONNX/candle-backed STT/TTS/VAD engines and its
//! barge-in/streaming-to-TTS machinery do not — this engine holds providers as trait objects
//! injected by the caller, and speech segmentation is the plain RMS-energy `audio` crate engine
//! rather than a neural one.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tracing::warn;

use voice_core::audio::SampleRate;
use voice_core::traits::{
    LanguageModel, ResampleMethod, ResampleUseCase, Resampler, SpeechToText, TextToSpeech,
    VADEvent, VoiceActivityDetector, VoiceConfig, VoiceTrigger,
};
use voice_core::{AudioData, Intent, IntentResult, TraceContext, UnifiedConversationContext, VoiceSegment};

use voice_core_config::WorkflowStagesConfig;
use voice_core_intents::{Orchestrator, Recognizer};
use voice_core_runtime::{record_error, record_intent_execution, record_request, record_stage_latency, record_total_latency, ContextManager};

use crate::error::WorkflowError;

const VOICE_TRIGGER_TARGET_HZ: u32 = 16000;

/// Parse the `[resampling].default_method` config string (§4.9) into the trait's method enum.
/// Unknown values fall back to `Adaptive`, the safest default (§4.4's "configuration authority"
/// still lets a stage override this per call via `ResampleUseCase`).
pub fn parse_resample_method(raw: &str) -> ResampleMethod {
    match raw {
        "linear" => ResampleMethod::Linear,
        "polyphase" => ResampleMethod::Polyphase,
        "sinc_kaiser" | "sinc-kaiser" => ResampleMethod::SincKaiser,
        _ => ResampleMethod::Adaptive,
    }
}

fn skip_wake_word(client_context: &Option<Value>) -> bool {
    client_context
        .as_ref()
        .and_then(|v| v.get("skip_wake_word"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Record a stage into the caller's trace, if one was supplied. A thin helper so call sites don't
/// each re-derive the "only if Some" check.
fn record_stage(
    trace: &mut Option<&mut TraceContext>,
    stage: &str,
    input: Value,
    output: Value,
    metadata: Value,
    elapsed_ms: u64,
) {
    if let Some(t) = trace {
        t.record_stage(stage, input, output, metadata, elapsed_ms);
    }
}

/// The assembled nine-stage engine. Every provider field is optional so the engine degrades
/// gracefully to whatever subset of stages a deployment actually wired up (§4.3's per-stage
/// enable flags are the config-level version of the same idea).
pub struct WorkflowEngine {
    stages: WorkflowStagesConfig,
    latency_budget_ms: u64,
    context_manager: Arc<ContextManager>,
    recognizer: Arc<Recognizer>,
    orchestrator: Arc<Orchestrator>,
    resample_method: ResampleMethod,

    voice_trigger: Option<Arc<dyn VoiceTrigger>>,
    vad: Option<Arc<dyn VoiceActivityDetector>>,
    stt: Option<Arc<dyn SpeechToText>>,
    resampler: Option<Arc<dyn Resampler>>,
    llm: Option<Arc<dyn LanguageModel>>,
    tts: Option<Arc<dyn TextToSpeech>>,
}

impl WorkflowEngine {
    pub fn new(
        stages: WorkflowStagesConfig,
        latency_budget_ms: u64,
        context_manager: Arc<ContextManager>,
        recognizer: Arc<Recognizer>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            stages,
            latency_budget_ms,
            context_manager,
            recognizer,
            orchestrator,
            resample_method: ResampleMethod::Adaptive,
            voice_trigger: None,
            vad: None,
            stt: None,
            resampler: None,
            llm: None,
            tts: None,
        }
    }

    pub fn with_resample_method(mut self, method: ResampleMethod) -> Self {
        self.resample_method = method;
        self
    }

    pub fn with_voice_trigger(mut self, voice_trigger: Arc<dyn VoiceTrigger>) -> Self {
        self.voice_trigger = Some(voice_trigger);
        self
    }

    pub fn with_vad(mut self, vad: Arc<dyn VoiceActivityDetector>) -> Self {
        self.vad = Some(vad);
        self
    }

    pub fn with_stt(mut self, stt: Arc<dyn SpeechToText>) -> Self {
        self.stt = Some(stt);
        self
    }

    pub fn with_resampler(mut self, resampler: Arc<dyn Resampler>) -> Self {
        self.resampler = Some(resampler);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub fn with_tts(mut self, tts: Arc<dyn TextToSpeech>) -> Self {
        self.tts = Some(tts);
        self
    }

    /// Entry point for text-origin input (§4.3): skips voice trigger, VAD, and ASR entirely.
    pub async fn process_text_input(
        &self,
        text: &str,
        session_id: &str,
        wants_audio: bool,
        client_context: Option<Value>,
        trace: Option<&mut TraceContext>,
    ) -> IntentResult {
        let start = Instant::now();
        let mut trace = trace;
        let mut context = self.context_manager.get_or_create(session_id);
        if let Some(t) = trace.as_deref_mut() {
            t.context_before = serde_json::to_value(&context).ok();
        }
        if let Some(client_context) = client_context {
            context.metadata.insert("client_context".to_string(), client_context);
        }

        let result = self.run_from_text_processing(text, &mut context, wants_audio, &mut trace).await;

        if let Some(t) = trace.as_deref_mut() {
            t.context_after = serde_json::to_value(&context).ok();
        }
        self.context_manager.save(context);
        record_total_latency(start.elapsed().as_secs_f64() * 1000.0);
        self.warn_if_over_budget(start);
        result
    }

    /// Entry point for one already-captured utterance of audio (§4.3): runs voice trigger, VAD,
    /// and ASR, then the same text-onward pipeline as [`Self::process_text_input`].
    pub async fn process_audio_input(
        &self,
        audio: AudioData,
        session_id: &str,
        wants_audio: bool,
        client_context: Option<Value>,
        trace: Option<&mut TraceContext>,
    ) -> IntentResult {
        let start = Instant::now();
        let mut trace = trace;
        let mut context = self.context_manager.get_or_create(session_id);
        if let Some(t) = trace.as_deref_mut() {
            t.context_before = serde_json::to_value(&context).ok();
        }
        if let Some(client_context) = client_context.clone() {
            context.metadata.insert("client_context".to_string(), client_context);
        }

        let result = match self.run_voice_trigger_and_vad(&audio, &client_context, &mut trace).await {
            Ok(Some(gated_audio)) => {
                match self.run_asr(&gated_audio, &mut trace).await {
                    Ok(transcript) => {
                        self.run_from_text_processing(&transcript, &mut context, wants_audio, &mut trace).await
                    }
                    Err(err) => {
                        record_error("asr", err.as_error_kind_str());
                        IntentResult::failure(err.as_error_kind_str(), err.to_string())
                    }
                }
            }
            Ok(None) => {
                // Gate closed: no wake word detected, nothing to do this turn.
                let mut no_op = IntentResult::success(String::new());
                no_op.should_speak = false;
                no_op.with_metadata("voice_trigger_detected", false)
            }
            Err(err) => {
                record_error("voice_trigger", err.as_error_kind_str());
                IntentResult::failure(err.as_error_kind_str(), err.to_string())
            }
        };

        if let Some(t) = trace.as_deref_mut() {
            t.context_after = serde_json::to_value(&context).ok();
        }
        self.context_manager.save(context);
        record_total_latency(start.elapsed().as_secs_f64() * 1000.0);
        self.warn_if_over_budget(start);
        result
    }

    /// Continuous mode (§4.3 "process_audio_stream"): wake-word gating plus VAD segmentation over
    /// a live frame stream, yielding one `IntentResult` per detected utterance. Frames between
    /// utterances (silence, or audio before the wake word) never produce an item.
    pub fn process_audio_stream<'a>(
        &'a self,
        frames: Pin<Box<dyn Stream<Item = AudioData> + Send + 'a>>,
        session_id: String,
        wants_audio: bool,
        client_context: Option<Value>,
    ) -> Pin<Box<dyn Stream<Item = IntentResult> + Send + 'a>> {
        Box::pin(async_stream::stream! {
            let mut frames = frames;
            let mut triggered = !self.stages.voice_trigger_enabled || skip_wake_word(&client_context);
            let mut segment: Option<VoiceSegment> = None;

            while let Some(frame) = frames.next().await {
                if !triggered {
                    triggered = self.detect_wake_word(&frame).await;
                    if !triggered {
                        continue;
                    }
                }

                let Some(vad) = &self.vad else {
                    let result = self
                        .process_audio_input(frame, &session_id, wants_audio, client_context.clone(), None)
                        .await;
                    triggered = !self.stages.voice_trigger_enabled || skip_wake_word(&client_context);
                    yield result;
                    continue;
                };

                if !self.stages.vad_enabled {
                    let result = self
                        .process_audio_input(frame, &session_id, wants_audio, client_context.clone(), None)
                        .await;
                    triggered = !self.stages.voice_trigger_enabled || skip_wake_word(&client_context);
                    yield result;
                    continue;
                }

                match vad.process_frame(&frame).await {
                    VADEvent::SegmentStart => {
                        let mut s = VoiceSegment::new(frame.timestamp());
                        s.push(frame);
                        segment = Some(s);
                    }
                    VADEvent::SegmentContinue { .. } => {
                        if let Some(s) = segment.as_mut() {
                            s.push(frame);
                        }
                    }
                    VADEvent::SegmentEnd => {
                        if let Some(s) = segment.take() {
                            if let Some(utterance) = s.combined_audio() {
                                let result = self
                                    .process_audio_input(
                                        utterance,
                                        &session_id,
                                        wants_audio,
                                        client_context.clone(),
                                        None,
                                    )
                                    .await;
                                triggered = !self.stages.voice_trigger_enabled || skip_wake_word(&client_context);
                                yield result;
                            }
                        }
                    }
                    VADEvent::Silence => {}
                }
            }
        })
    }

    async fn detect_wake_word(&self, frame: &AudioData) -> bool {
        let Some(vt) = &self.voice_trigger else { return true };
        match vt.detect(frame).await {
            Ok(result) => result.detected,
            Err(err) => {
                warn!(error = %err, "voice trigger detection failed mid-stream, staying ungated");
                false
            }
        }
    }

    /// Voice trigger + VAD stages for one captured utterance (§4.3, §4.4). Returns `Ok(None)`
    /// when the trigger gate is closed (nothing to process this turn), `Ok(Some(audio))` with the
    /// audio to feed ASR otherwise. VAD here is best-effort: it never blocks the utterance, it
    /// only annotates the trace with the state it observed.
    async fn run_voice_trigger_and_vad(
        &self,
        audio: &AudioData,
        client_context: &Option<Value>,
        trace: &mut Option<&mut TraceContext>,
    ) -> Result<Option<AudioData>, WorkflowError> {
        if self.stages.voice_trigger_enabled && !skip_wake_word(client_context) {
            let started = Instant::now();
            let vt = self
                .voice_trigger
                .as_ref()
                .ok_or_else(|| WorkflowError::ComponentNotAvailable("voice_trigger".to_string()))?;

            let detect_audio = if vt.supports_resampling() {
                audio.clone()
            } else {
                self.resample_for(audio, VOICE_TRIGGER_TARGET_HZ, ResampleUseCase::VoiceTrigger).await?
            };

            record_request("voice_trigger");
            let outcome = vt
                .detect(&detect_audio)
                .await
                .map_err(|e| WorkflowError::VoiceTriggerFailed(e.to_string()))?;
            record_stage_latency("voice_trigger", started.elapsed().as_secs_f64() * 1000.0);
            record_stage(
                trace,
                "voice_trigger",
                json!({"duration_ms": audio.duration_ms()}),
                json!({"detected": outcome.detected, "confidence": outcome.confidence}),
                Value::Null,
                started.elapsed().as_millis() as u64,
            );

            if !outcome.detected {
                return Ok(None);
            }
        }

        if self.stages.vad_enabled {
            if let Some(vad) = &self.vad {
                let started = Instant::now();
                let event = vad.process_frame(audio).await;
                record_stage(
                    trace,
                    "vad",
                    json!({"duration_ms": audio.duration_ms()}),
                    json!({"event": format!("{event:?}"), "is_speech": event.is_speech()}),
                    Value::Null,
                    started.elapsed().as_millis() as u64,
                );
            }
        }

        Ok(Some(audio.clone()))
    }

    /// ASR stage (§4.3, §4.7): negotiates sample rate against the provider's preferences before
    /// transcribing. A resampling failure resets the provider's state so the next utterance does
    /// not inherit contamination from a half-processed one (§4.7).
    async fn run_asr(
        &self,
        audio: &AudioData,
        trace: &mut Option<&mut TraceContext>,
    ) -> Result<String, WorkflowError> {
        if !self.stages.asr_enabled {
            return Ok(String::new());
        }
        let stt = self.stt.as_ref().ok_or_else(|| WorkflowError::ComponentNotAvailable("asr".to_string()))?;
        let started = Instant::now();
        record_request("asr");

        let negotiated = if stt.supports_sample_rate(audio.sample_rate().as_u32()) {
            audio.clone()
        } else {
            let preferred = stt.get_preferred_sample_rates().first().copied().unwrap_or(16000);
            match self.resample_for(audio, preferred, ResampleUseCase::Asr).await {
                Ok(resampled) => resampled,
                Err(err) => {
                    stt.reset(None).await;
                    return Err(err);
                }
            }
        };

        let transcript = stt
            .transcribe(&negotiated)
            .await
            .map_err(|e| WorkflowError::TranscriptionFailed(e.to_string()))?;
        record_stage_latency("asr", started.elapsed().as_secs_f64() * 1000.0);
        record_stage(
            trace,
            "asr",
            json!({"sample_rate": audio.sample_rate().as_u32()}),
            json!({"text": transcript.text, "confidence": transcript.confidence}),
            Value::Null,
            started.elapsed().as_millis() as u64,
        );
        Ok(transcript.text)
    }

    async fn resample_for(
        &self,
        audio: &AudioData,
        target_hz: u32,
        use_case: ResampleUseCase,
    ) -> Result<AudioData, WorkflowError> {
        let resampler = self
            .resampler
            .as_ref()
            .ok_or_else(|| WorkflowError::ComponentNotAvailable("resampler".to_string()))?;
        resampler
            .resample(audio, SampleRate::from(target_hz), self.resample_method, use_case)
            .await
            .map_err(|e| WorkflowError::ResamplingFailed(e.to_string()))
    }

    /// Text processing, NLU, intent execution, LLM enrichment, TTS, and audio output — the tail
    /// five stages shared by every entry point once there is text in hand (§4.3).
    async fn run_from_text_processing(
        &self,
        raw_text: &str,
        context: &mut UnifiedConversationContext,
        wants_audio: bool,
        trace: &mut Option<&mut TraceContext>,
    ) -> IntentResult {
        let normalized = self.run_text_processing(raw_text, trace);
        let intent = self.run_nlu(&normalized, context, trace).await;
        let mut result = self.run_intent_execution(intent, context, trace).await;

        if self.stages.llm_enabled {
            self.run_llm_enrichment(&mut result, &context.session_id, trace).await;
        }

        if wants_audio && result.should_speak {
            self.run_tts(&mut result, context, trace).await;
        }

        result
    }

    /// Text processing stage (§4.3): pure normalization, best-effort by construction (it cannot
    /// fail — a malformed `expand_numbers` match just passes its input through unchanged).
    fn run_text_processing(&self, raw_text: &str, trace: &mut Option<&mut TraceContext>) -> String {
        if !self.stages.text_processing_enabled {
            return raw_text.to_string();
        }
        let started = Instant::now();
        let normalized = voice_core_text_processing::normalize(raw_text);
        record_stage(
            trace,
            "text_processing",
            json!({"text": raw_text}),
            json!({"text": normalized}),
            Value::Null,
            started.elapsed().as_millis() as u64,
        );
        normalized
    }

    /// NLU stage (§4.3, §4.5): the `Recognizer` already implements the confidence-floor fallback
    /// to `conversation.general`, so a disabled stage just means "skip straight to that fallback".
    async fn run_nlu(
        &self,
        text: &str,
        context: &UnifiedConversationContext,
        trace: &mut Option<&mut TraceContext>,
    ) -> Intent {
        if !self.stages.nlu_enabled {
            return Intent::new("conversation", "general", text, &context.session_id, 1.0);
        }
        let started = Instant::now();
        record_request("nlu");
        let intent = self.recognizer.recognize(text, context).await;
        record_stage_latency("nlu", started.elapsed().as_secs_f64() * 1000.0);
        record_stage(
            trace,
            "nlu",
            json!({"text": text}),
            json!({"intent": intent.name(), "confidence": intent.confidence}),
            Value::Null,
            started.elapsed().as_millis() as u64,
        );
        intent
    }

    /// Intent execution stage (§4.3, §4.5): the `Orchestrator` owns the entire contextual
    /// resolution / registry lookup / handler dispatch chain.
    async fn run_intent_execution(
        &self,
        intent: Intent,
        context: &mut UnifiedConversationContext,
        trace: &mut Option<&mut TraceContext>,
    ) -> IntentResult {
        if !self.stages.intent_execution_enabled {
            return IntentResult::success(String::new()).with_metadata("intent_execution_skipped", true);
        }
        let started = Instant::now();
        let intent_name = intent.name();
        record_request("intent_execution");
        let result = self.orchestrator.dispatch(intent, context).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        record_stage_latency("intent_execution", elapsed_ms);
        record_intent_execution(&intent_name, result.success, elapsed_ms);
        if !result.success {
            record_error("intent_execution", result.error.as_deref().unwrap_or("unknown"));
        }
        record_stage(
            trace,
            "intent_execution",
            json!({"intent": intent_name}),
            json!({"success": result.success, "text": result.text}),
            Value::Null,
            started.elapsed().as_millis() as u64,
        );
        result
    }

    /// LLM enrichment stage (§4.3): best-effort, replaces `result.text` on success, leaves it
    /// untouched (and logs) on failure.
    async fn run_llm_enrichment(
        &self,
        result: &mut IntentResult,
        session_id: &str,
        trace: &mut Option<&mut TraceContext>,
    ) {
        let Some(llm) = &self.llm else { return };
        let started = Instant::now();
        record_request("llm");
        match llm.enrich(&result.text, session_id).await {
            Ok(enriched) => {
                record_stage_latency("llm", started.elapsed().as_secs_f64() * 1000.0);
                record_stage(
                    trace,
                    "llm",
                    json!({"text": result.text}),
                    json!({"text": enriched}),
                    Value::Null,
                    started.elapsed().as_millis() as u64,
                );
                result.text = enriched;
            }
            Err(err) => {
                warn!(error = %err, "llm enrichment failed, keeping handler text");
                record_error("llm", "generation_failed");
                record_stage(
                    trace,
                    "llm",
                    json!({"text": result.text}),
                    Value::Null,
                    json!({"degraded": true, "error": err.to_string()}),
                    started.elapsed().as_millis() as u64,
                );
            }
        }
    }

    /// TTS + audio output stages (§4.3): only reached when the caller wants audio and the result
    /// says it should be spoken. Unlike VAD/text-processing/LLM, a synthesis failure here is not
    /// best-effort — it turns the whole result into a failure, since there would be nothing left
    /// to hand the caller otherwise.
    async fn run_tts(
        &self,
        result: &mut IntentResult,
        context: &UnifiedConversationContext,
        trace: &mut Option<&mut TraceContext>,
    ) {
        if !self.stages.tts_enabled || !self.stages.audio_output_enabled {
            return;
        }
        let Some(tts) = &self.tts else { return };
        let started = Instant::now();
        record_request("tts");
        let voice_config = VoiceConfig { voice_id: None, language: context.language.clone(), speed: 1.0 };

        match tts.synthesize(&result.text, &voice_config).await {
            Ok(audio) => {
                record_stage_latency("tts", started.elapsed().as_secs_f64() * 1000.0);
                record_stage(
                    trace,
                    "tts",
                    json!({"text": result.text}),
                    json!({"sample_rate": audio.sample_rate().as_u32(), "duration_ms": audio.duration_ms()}),
                    Value::Null,
                    started.elapsed().as_millis() as u64,
                );
                result.action_metadata = Some(json!({
                    "audio_base64": base64_encode(audio.bytes()),
                    "sample_rate": audio.sample_rate().as_u32(),
                    "channels": audio.channels().count(),
                }));
            }
            Err(err) => {
                let kind = WorkflowError::TtsFailed(err.to_string());
                record_error("tts", kind.as_error_kind_str());
                record_stage(
                    trace,
                    "tts",
                    json!({"text": result.text}),
                    Value::Null,
                    json!({"error": err.to_string()}),
                    started.elapsed().as_millis() as u64,
                );
                *result = IntentResult::failure(kind.as_error_kind_str(), kind.to_string());
            }
        }
    }

    fn warn_if_over_budget(&self, start: Instant) {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        if elapsed_ms > self.latency_budget_ms {
            warn!(elapsed_ms, budget_ms = self.latency_budget_ms, "workflow exceeded latency budget");
        }
    }
}

impl WorkflowError {
    fn as_error_kind_str(&self) -> &'static str {
        use voice_core::error::AsErrorKind;
        self.as_error_kind().as_str()
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use voice_core::audio::{Channels, SampleRate};
    use voice_core::error::ErrorKind;
    use voice_core::traits::{
        IntentHandler, IntentPattern, ProviderError, ProviderResult, TranscriptResult, VoiceInfo,
        VoiceTriggerResult,
    };
    use voice_core::UnifiedConversationContext;
    use voice_core_intents::IntentRegistry;

    use super::*;

    struct EchoHandler {
        patterns: Vec<IntentPattern>,
    }

    impl EchoHandler {
        fn new() -> Self {
            Self { patterns: vec![IntentPattern::new("conversation", "general")] }
        }
    }

    #[async_trait]
    impl IntentHandler for EchoHandler {
        fn name(&self) -> &str {
            "conversation"
        }

        fn patterns(&self) -> &[IntentPattern] {
            &self.patterns
        }

        async fn execute(&self, intent: &Intent, _context: &mut UnifiedConversationContext) -> IntentResult {
            IntentResult::success(format!("echo: {}", intent.raw_text))
        }
    }

    fn test_engine(stages: WorkflowStagesConfig) -> WorkflowEngine {
        let mut registry = IntentRegistry::new();
        registry.register_handler(Arc::new(EchoHandler::new()));
        let orchestrator = Arc::new(Orchestrator::new(Arc::new(registry), HashMap::new(), Vec::new()));
        WorkflowEngine::new(stages, 1500, Arc::new(ContextManager::new()), Arc::new(Recognizer::new()), orchestrator)
    }

    fn mono_16k_audio() -> AudioData {
        AudioData::new(vec![0u8; 640], SampleRate::Hz16000, Channels::Mono)
    }

    #[test]
    fn parse_resample_method_maps_known_strings_and_falls_back_to_adaptive() {
        assert_eq!(parse_resample_method("linear"), ResampleMethod::Linear);
        assert_eq!(parse_resample_method("polyphase"), ResampleMethod::Polyphase);
        assert_eq!(parse_resample_method("sinc_kaiser"), ResampleMethod::SincKaiser);
        assert_eq!(parse_resample_method("sinc-kaiser"), ResampleMethod::SincKaiser);
        assert_eq!(parse_resample_method("whatever"), ResampleMethod::Adaptive);
    }

    #[tokio::test]
    async fn process_text_input_runs_nlu_fallback_and_dispatches_to_handler() {
        let engine = test_engine(WorkflowStagesConfig::default());
        let result = engine.process_text_input("hello there", "s1", false, None, None).await;
        assert!(result.success);
        assert_eq!(result.text, "echo: hello there");
    }

    struct NeverDetects;

    #[async_trait]
    impl VoiceTrigger for NeverDetects {
        async fn detect(&self, _audio: &AudioData) -> Result<VoiceTriggerResult, ProviderError> {
            Ok(VoiceTriggerResult { detected: false, confidence: 0.1 })
        }

        fn supports_resampling(&self) -> bool {
            true
        }

        fn provider_name(&self) -> &str {
            "never-detects"
        }
    }

    #[tokio::test]
    async fn process_audio_input_gate_closed_yields_silent_no_op() {
        let engine = test_engine(WorkflowStagesConfig::default()).with_voice_trigger(Arc::new(NeverDetects));
        let result = engine.process_audio_input(mono_16k_audio(), "s1", true, None, None).await;
        assert!(result.success);
        assert!(!result.should_speak);
        assert_eq!(result.metadata.get("voice_trigger_detected"), Some(&Value::Bool(false)));
    }

    struct FixedStt;

    #[async_trait]
    impl SpeechToText for FixedStt {
        async fn transcribe(&self, _audio: &AudioData) -> ProviderResult<TranscriptResult> {
            Ok(TranscriptResult {
                text: "turn on the lights".to_string(),
                confidence: 0.9,
                is_final: true,
                language: None,
            })
        }

        fn transcribe_stream<'a>(
            &'a self,
            _audio_stream: Pin<Box<dyn Stream<Item = AudioData> + Send + 'a>>,
        ) -> Pin<Box<dyn Stream<Item = ProviderResult<TranscriptResult>> + Send + 'a>> {
            Box::pin(futures::stream::empty())
        }

        fn get_preferred_sample_rates(&self) -> &[u32] {
            &[16000]
        }

        async fn reset(&self, _language: Option<&str>) {}

        fn provider_name(&self) -> &str {
            "fixed-stt"
        }
    }

    #[tokio::test]
    async fn process_audio_input_transcribes_then_dispatches_text_pipeline() {
        let mut stages = WorkflowStagesConfig::default();
        stages.voice_trigger_enabled = false;
        stages.vad_enabled = false;
        let engine = test_engine(stages).with_stt(Arc::new(FixedStt));
        let result = engine.process_audio_input(mono_16k_audio(), "s1", false, None, None).await;
        assert!(result.success);
        assert_eq!(result.text, "echo: turn on the lights");
    }

    struct FailingTts;

    #[async_trait]
    impl TextToSpeech for FailingTts {
        async fn synthesize(&self, _text: &str, _config: &VoiceConfig) -> ProviderResult<AudioData> {
            Err(ProviderError::SynthesisFailed("engine offline".to_string()))
        }

        fn synthesize_stream<'a>(
            &'a self,
            _text_stream: Pin<Box<dyn Stream<Item = String> + Send + 'a>>,
            _config: &'a VoiceConfig,
        ) -> Pin<Box<dyn Stream<Item = ProviderResult<AudioData>> + Send + 'a>> {
            Box::pin(futures::stream::empty())
        }

        fn available_voices(&self) -> &[VoiceInfo] {
            &[]
        }

        fn provider_name(&self) -> &str {
            "failing-tts"
        }
    }

    #[tokio::test]
    async fn tts_failure_overwrites_the_whole_result_not_best_effort() {
        let engine = test_engine(WorkflowStagesConfig::default()).with_tts(Arc::new(FailingTts));
        let result = engine.process_text_input("hello", "s1", true, None, None).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(ErrorKind::TtsFailed.as_str()));
    }
}
