//! Optional LLM enrichment provider for the workflow engine's `llm` stage (§4.3).
//!
//! The core's non-goals exclude a persona-specific conversational backend and tool/function
//! calling; this crate only needs to turn a `LanguageModel::enrich` call into one HTTP request
//! against an OpenAI-compatible chat-completions endpoint (Ollama, vLLM, OpenAI itself, or
//! anything speaking the same wire format).

mod http_provider;

pub use http_provider::{HttpLanguageModel, HttpLlmConfig};
