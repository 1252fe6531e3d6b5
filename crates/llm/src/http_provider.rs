//! `HttpLanguageModel` — a generic OpenAI-compatible chat-completions client implementing
//! `voice_core::traits::LanguageModel` (§4.3's optional `llm` enrichment stage).
//!
//! Grounded on the donor's `OpenAIBackend`/`OpenAIConfig` (`crates/llm/src/backend.rs`): same
//! request/response shapes, same `local()`/`openai()`/`azure()` constructor split. Streaming,
//! retry-with-backoff, KV-cache session reuse, and tool calling are dropped — this stage asks an
//! LLM for one thing only, "improve this text," so a single non-streaming request is enough.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use voice_core::traits::{LanguageModel, LlmError};
use voice_core_config::ComponentConfig;

#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
    pub system_prompt: String,
}

impl Default for HttpLlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            api_key: "not-needed".to_string(),
            model: "qwen2.5:3b-instruct".to_string(),
            max_tokens: 256,
            temperature: 0.7,
            timeout: Duration::from_secs(10),
            system_prompt: "Rephrase the assistant's reply to sound more natural when spoken \
                aloud. Keep the meaning unchanged and do not add new facts."
                .to_string(),
        }
    }
}

impl HttpLlmConfig {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn local(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Build from a `[components.llm]` table's `providers.<name>` entry. Unset keys fall back to
    /// `Default`, so a provider table only needs to override what it changes.
    pub fn from_component_config(config: &ComponentConfig, provider_name: &str) -> Self {
        let defaults = Self::default();
        let Some(table) = config.providers.get(provider_name) else {
            return defaults;
        };
        let get_str = |key: &str, fallback: String| -> String {
            table.get(key).and_then(|v| v.as_str()).map(str::to_string).unwrap_or(fallback)
        };
        Self {
            endpoint: get_str("endpoint", defaults.endpoint),
            api_key: get_str("api_key", defaults.api_key),
            model: get_str("model", defaults.model),
            max_tokens: table
                .get("max_tokens")
                .and_then(|v| v.as_integer())
                .map(|n| n as usize)
                .unwrap_or(defaults.max_tokens),
            temperature: table
                .get("temperature")
                .and_then(|v| v.as_float())
                .map(|f| f as f32)
                .unwrap_or(defaults.temperature),
            timeout: defaults.timeout,
            system_prompt: get_str("system_prompt", defaults.system_prompt),
        }
    }
}

pub struct HttpLanguageModel {
    config: HttpLlmConfig,
    client: Client,
}

impl HttpLanguageModel {
    pub fn new(config: HttpLlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn enrich(&self, text: &str, session_id: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: self.config.system_prompt.clone() },
                ChatMessage { role: "user".to_string(), content: text.to_string() },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(format!("session {session_id}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::GenerationFailed(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::GenerationFailed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::GenerationFailed("empty response".to_string()))
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.config.endpoint.trim_end_matches('/'));
        self.client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_config_defaults_api_key_to_not_needed_style() {
        let config = HttpLlmConfig::local("http://localhost:8000/v1", "llama-3");
        assert_eq!(config.endpoint, "http://localhost:8000/v1");
        assert_eq!(config.model, "llama-3");
    }

    #[test]
    fn openai_config_targets_the_public_api() {
        let config = HttpLlmConfig::openai("sk-xxx", "gpt-4o-mini");
        assert_eq!(config.endpoint, "https://api.openai.com/v1");
        assert_eq!(config.api_key, "sk-xxx");
    }

    #[test]
    fn builds_from_config_without_network_access() {
        let model = HttpLanguageModel::new(HttpLlmConfig::default()).unwrap();
        assert_eq!(model.model_name(), "qwen2.5:3b-instruct");
    }

    #[test]
    fn missing_provider_table_falls_back_to_defaults() {
        let component = ComponentConfig::default();
        let config = HttpLlmConfig::from_component_config(&component, "ollama");
        assert_eq!(config.model, HttpLlmConfig::default().model);
    }

    #[test]
    fn provider_table_overrides_selected_fields() {
        let mut component = ComponentConfig::default();
        let mut table = toml::map::Map::new();
        table.insert("model".to_string(), toml::Value::String("gpt-4o-mini".to_string()));
        table.insert("endpoint".to_string(), toml::Value::String("https://api.openai.com/v1".to_string()));
        component.providers.insert("openai".to_string(), toml::Value::Table(table));

        let config = HttpLlmConfig::from_component_config(&component, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.endpoint, "https://api.openai.com/v1");
        // untouched field still falls back to the default
        assert_eq!(config.max_tokens, HttpLlmConfig::default().max_tokens);
    }
}
