//! The nine-stage workflow engine (§4.3): voice trigger, VAD, ASR, text processing, NLU, intent
//! execution, LLM enrichment, TTS, audio output. Ties together `audio`, `intents`, `runtime`,
//! `text_processing`, and `llm` into the three entry points a web or CLI surface calls against
//! (`process_text_input`, `process_audio_input`, `process_audio_stream`).

mod engine;
mod error;

pub use engine::{parse_resample_method, WorkflowEngine};
pub use error::WorkflowError;
