//! WebSocket ASR protocols (§4.10, §6): base64 JSON framing at `/ws/asr/stream`, raw PCM framing
//! with a session-config handshake at `/ws/asr/binary`. Both protocols are registered verbatim as
//! channels in [`crate::asyncapi`] — keep the paths in sync if either changes.
//!
//! Grounded on the donor's `websocket.rs` for the split-sender/`Arc<Mutex>` idiom and the
//! base64-JSON message loop; the donor's single conversational WebSocket is split into two
//! narrower ASR-only endpoints here because this core has no session/RAG/tool surface of its own —
//! everything downstream of a transcript is already owned by [`voice_core_workflow::WorkflowEngine`].
//!
//! No concrete speech-to-text provider ships in this workspace (§4.7's Non-goals), so
//! `transcription_result.text` is the workflow engine's final response text rather than a raw
//! transcript — the engine runs VAD → ASR → NLU → intent end to end per chunk. A dedicated
//! transcribe-only entry point would need a new `WorkflowEngine` method; noted as a gap in
//! DESIGN.md rather than invented here.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use voice_core::{AudioData, Channels, SampleRate};

use crate::state::AppState;

pub async fn asr_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_base64_stream(socket, state))
}

pub async fn asr_binary(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_binary_stream(socket, state))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IncomingJsonMessage {
    AudioChunk {
        data: String,
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        provider: Option<String>,
    },
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn transcription_result(text: &str, provider: &str, language: &str) -> Value {
    json!({
        "type": "transcription_result",
        "text": text,
        "provider": provider,
        "language": language,
        "timestamp": now_iso(),
    })
}

fn error_message(error: impl std::fmt::Display) -> Value {
    json!({"type": "error", "error": error.to_string(), "timestamp": now_iso()})
}

async fn send_json(socket: &mut WebSocket, value: &Value) {
    if let Ok(text) = serde_json::to_string(value) {
        let _ = socket.send(Message::Text(text)).await;
    }
}

/// Base64 JSON protocol at `/ws/asr/stream`: every `audio_chunk` is run through the pipeline
/// independently (§5: per-session arrival-order processing, no cross-chunk audio buffering at
/// this layer — that's the VAD's job inside the engine).
async fn handle_base64_stream(mut socket: WebSocket, state: AppState) {
    let session_id = format!("ws-stream-{}", uuid::Uuid::new_v4());
    tracing::info!(session_id, "asr stream websocket connected");

    while let Some(msg) = socket.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "websocket receive error");
                break;
            }
        };

        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Binary(_) => {
                send_json(&mut socket, &error_message("binary frames are not accepted on this endpoint, use /ws/asr/binary")).await;
                continue;
            }
        };

        let parsed: Result<IncomingJsonMessage, _> = serde_json::from_str(&text);
        let IncomingJsonMessage::AudioChunk { data, language, provider } = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                send_json(&mut socket, &error_message(format!("invalid message: {e}"))).await;
                continue;
            }
        };

        let bytes = match BASE64.decode(data.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                send_json(&mut socket, &error_message(format!("invalid base64 audio: {e}"))).await;
                continue;
            }
        };

        let audio = AudioData::new(bytes, SampleRate::Hz16000, Channels::Mono);
        let client_context = Some(json!({"source": "ws_asr_stream", "skip_wake_word": true}));
        let result = state.engine.process_audio_input(audio, &session_id, false, client_context, None).await;

        if result.success {
            send_json(
                &mut socket,
                &transcription_result(&result.text, provider.as_deref().unwrap_or("default"), language.as_deref().unwrap_or("auto")),
            )
            .await;
        } else {
            send_json(&mut socket, &error_message(result.error.unwrap_or_else(|| "transcription failed".to_string()))).await;
        }
    }

    tracing::info!(session_id, "asr stream websocket disconnected");
}

#[derive(Debug, Deserialize)]
struct SessionConfigPayload {
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,
    #[serde(default = "default_channels")]
    channels: u32,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    provider: Option<String>,
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SessionConfigMessage {
    Wrapped { session_config: SessionConfigPayload },
    Flat(SessionConfigPayload),
}

impl SessionConfigMessage {
    fn into_payload(self) -> SessionConfigPayload {
        match self {
            SessionConfigMessage::Wrapped { session_config } => session_config,
            SessionConfigMessage::Flat(payload) => payload,
        }
    }
}

fn sample_rate_from_hz(hz: u32) -> SampleRate {
    match hz {
        8000 => SampleRate::Hz8000,
        16000 => SampleRate::Hz16000,
        22050 => SampleRate::Hz22050,
        44100 => SampleRate::Hz44100,
        48000 => SampleRate::Hz48000,
        other => SampleRate::Other(other),
    }
}

fn channels_from_count(count: u32) -> Channels {
    if count >= 2 {
        Channels::Stereo
    } else {
        Channels::Mono
    }
}

/// Binary PCM protocol at `/ws/asr/binary`: the first text frame negotiates sample rate/channels,
/// subsequent binary frames are raw PCM carried straight through to the engine.
async fn handle_binary_stream(mut socket: WebSocket, state: AppState) {
    let session_id = format!("ws-binary-{}", uuid::Uuid::new_v4());
    tracing::info!(session_id, "asr binary websocket connected");

    let config = loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<SessionConfigMessage>(&text) {
                Ok(parsed) => break parsed.into_payload(),
                Err(e) => {
                    send_json(&mut socket, &error_message(format!("invalid session config: {e}"))).await;
                    continue;
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => {
                send_json(&mut socket, &error_message("expected a session_config message first")).await;
                continue;
            }
            Some(Err(e)) => {
                tracing::warn!(session_id, error = %e, "websocket receive error");
                return;
            }
        }
    };

    let sample_rate = sample_rate_from_hz(config.sample_rate);
    let channels = channels_from_count(config.channels);

    send_json(
        &mut socket,
        &json!({
            "type": "session_ready",
            "protocol_format": "pcm_s16le",
            "config": {"sample_rate": config.sample_rate, "channels": config.channels},
            "timestamp": now_iso(),
        }),
    )
    .await;

    while let Some(msg) = socket.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "websocket receive error");
                break;
            }
        };

        let data = match msg {
            Message::Binary(data) => data,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Text(_) => {
                send_json(&mut socket, &error_message("expected binary PCM frames after session_config")).await;
                continue;
            }
        };

        let audio = AudioData::new(data, sample_rate, channels);
        let client_context = Some(json!({"source": "ws_asr_binary", "skip_wake_word": true}));
        let result = state.engine.process_audio_input(audio, &session_id, false, client_context, None).await;

        if result.success {
            send_json(
                &mut socket,
                &transcription_result(&result.text, config.provider.as_deref().unwrap_or("default"), config.language.as_deref().unwrap_or("auto")),
            )
            .await;
        } else {
            send_json(&mut socket, &error_message(result.error.unwrap_or_else(|| "transcription failed".to_string()))).await;
        }
    }

    tracing::info!(session_id, "asr binary websocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_accepts_both_wrapped_and_flat_forms() {
        let flat: SessionConfigMessage = serde_json::from_str(r#"{"sample_rate": 44100, "channels": 2}"#).unwrap();
        assert_eq!(flat.into_payload().sample_rate, 44100);

        let wrapped: SessionConfigMessage =
            serde_json::from_str(r#"{"session_config": {"sample_rate": 8000, "channels": 1}}"#).unwrap();
        assert_eq!(wrapped.into_payload().sample_rate, 8000);
    }

    #[test]
    fn sample_rate_mapping_covers_known_rates_and_falls_back_to_other() {
        assert!(matches!(sample_rate_from_hz(16000), SampleRate::Hz16000));
        assert!(matches!(sample_rate_from_hz(12345), SampleRate::Other(12345)));
    }

    #[test]
    fn channel_count_below_two_is_mono() {
        assert!(matches!(channels_from_count(1), Channels::Mono));
        assert!(matches!(channels_from_count(2), Channels::Stereo));
    }
}
