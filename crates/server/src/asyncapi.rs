//! AsyncAPI 3.0.0 document generation (§4.10, §6).
//!
//! Grounded on the donor's `web_api/asyncapi.py`: a small registry of WebSocket endpoint metadata
//! (`receives_schema`, `sends_schema`, `description`, `tags`) merged into a skeleton spec. Rust has
//! no equivalent of the donor's decorator-based registry that attaches metadata to a router at
//! import time, so this is a static list built once rather than discovered by scanning handlers —
//! this server owns both of its ASR WebSocket endpoints directly, so there is nothing to scan.
//!
//! Schemas are hand-rolled `serde_json::json!` objects rather than derived via `schemars`, matching
//! the donor's preference for explicit schema construction over a derivation macro crate (see
//! DESIGN.md).

use serde_json::{json, Value};

struct EndpointSpec {
    path: &'static str,
    description: &'static str,
    tags: &'static [&'static str],
    receive_messages: Vec<Value>,
    send_messages: Vec<Value>,
}

fn message(name: &str, title: &str, description: &str, payload: Value) -> Value {
    json!({
        "name": name,
        "title": title,
        "contentType": "application/json",
        "description": description,
        "payload": payload,
    })
}

fn audio_chunk_message() -> Value {
    message(
        "AudioChunk",
        "Audio chunk (base64 JSON protocol)",
        "One chunk of audio, base64-encoded, sent over the JSON ASR WebSocket protocol.",
        json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "enum": ["audio_chunk"]},
                "data": {"type": "string", "description": "base64-encoded audio bytes"},
                "language": {"type": "string"},
                "provider": {"type": "string"}
            },
            "required": ["type", "data"]
        }),
    )
}

fn transcription_result_message() -> Value {
    message(
        "TranscriptionResult",
        "Transcription result",
        "A completed transcription for the most recent chunk or utterance.",
        json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "enum": ["transcription_result"]},
                "text": {"type": "string"},
                "provider": {"type": "string"},
                "language": {"type": "string"},
                "timestamp": {"type": "string", "format": "date-time"}
            },
            "required": ["type", "text", "timestamp"]
        }),
    )
}

fn error_message() -> Value {
    message(
        "AsrError",
        "ASR error",
        "Emitted when transcription or session setup fails.",
        json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "enum": ["error"]},
                "error": {"type": "string"},
                "timestamp": {"type": "string", "format": "date-time"}
            },
            "required": ["type", "error", "timestamp"]
        }),
    )
}

fn session_config_message() -> Value {
    message(
        "SessionConfig",
        "Session configuration (binary PCM protocol)",
        "First message on the binary PCM ASR WebSocket, negotiating the audio format.",
        json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "enum": ["session_config", "binary_websocket_protocol"]},
                "sample_rate": {"type": "integer"},
                "channels": {"type": "integer"},
                "format": {"type": "string", "enum": ["pcm_s16le"]},
                "language": {"type": "string"},
                "provider": {"type": "string"},
                "session_config": {"type": "object", "description": "present on the wrapper form"}
            },
            "required": ["type"]
        }),
    )
}

fn session_ready_message() -> Value {
    message(
        "SessionReady",
        "Session ready",
        "Acknowledges a binary-protocol session config and echoes the negotiated settings.",
        json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "enum": ["session_ready"]},
                "protocol_format": {"type": "string"},
                "config": {"type": "object"},
                "timestamp": {"type": "string", "format": "date-time"}
            },
            "required": ["type", "protocol_format", "timestamp"]
        }),
    )
}

fn endpoints() -> Vec<EndpointSpec> {
    vec![
        EndpointSpec {
            path: "/ws/asr/stream",
            description: "Base64 JSON audio stream for speech recognition.",
            tags: &["asr", "websocket"],
            receive_messages: vec![audio_chunk_message()],
            send_messages: vec![transcription_result_message(), error_message()],
        },
        EndpointSpec {
            path: "/ws/asr/binary",
            description: "Binary PCM audio stream for speech recognition, with a session-config handshake.",
            tags: &["asr", "websocket"],
            receive_messages: vec![session_config_message()],
            send_messages: vec![session_ready_message(), transcription_result_message(), error_message()],
        },
    ]
}

fn message_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/messages/{name}") })
}

fn message_name(message: &Value) -> String {
    message["name"].as_str().unwrap_or("Unknown").to_string()
}

/// Build the full AsyncAPI 3.0.0 document (§6). Channels are keyed by endpoint path; each gets a
/// `receive`/`send` operation per direction actually used, referencing message components.
pub fn build_asyncapi_spec() -> Value {
    let mut channels = serde_json::Map::new();
    let mut operations = serde_json::Map::new();
    let mut messages = serde_json::Map::new();

    for endpoint in endpoints() {
        let component = endpoint.path.trim_start_matches('/').replace('/', "_");
        let mut channel_messages = serde_json::Map::new();

        for msg in endpoint.receive_messages.iter().chain(endpoint.send_messages.iter()) {
            let name = message_name(msg);
            channel_messages.insert(name.clone(), message_ref(&name));
            messages.insert(name, msg.clone());
        }

        channels.insert(
            endpoint.path.to_string(),
            json!({
                "address": endpoint.path,
                "description": endpoint.description,
                "bindings": {"ws": {"method": "GET"}},
                "messages": channel_messages,
            }),
        );

        if !endpoint.receive_messages.is_empty() {
            operations.insert(
                format!("{component}_receive"),
                json!({
                    "action": "receive",
                    "channel": {"$ref": format!("#/channels/{}", jsonptr_escape(endpoint.path))},
                    "messages": endpoint.receive_messages.iter().map(|m| message_ref(&message_name(m))).collect::<Vec<_>>(),
                    "tags": endpoint.tags.iter().map(|t| json!({"name": t})).collect::<Vec<_>>(),
                }),
            );
        }
        if !endpoint.send_messages.is_empty() {
            operations.insert(
                format!("{component}_send"),
                json!({
                    "action": "send",
                    "channel": {"$ref": format!("#/channels/{}", jsonptr_escape(endpoint.path))},
                    "messages": endpoint.send_messages.iter().map(|m| message_ref(&message_name(m))).collect::<Vec<_>>(),
                    "tags": endpoint.tags.iter().map(|t| json!({"name": t})).collect::<Vec<_>>(),
                }),
            );
        }
    }

    json!({
        "asyncapi": "3.0.0",
        "info": {
            "title": "voice-core streaming API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "WebSocket ASR protocols exposed by the core runtime's web surface.",
        },
        "defaultContentType": "application/json",
        "channels": Value::Object(channels),
        "operations": Value::Object(operations),
        "components": {
            "messages": Value::Object(messages),
        },
    })
}

fn jsonptr_escape(path: &str) -> String {
    path.replace('~', "~0").replace('/', "~1")
}

/// A minimal recursive JSON-to-YAML renderer, scoped to the shapes `build_asyncapi_spec` produces
/// (objects, arrays, strings, numbers, bools, null — no anchors, no flow style, no comments). The
/// workspace carries no YAML parser/serializer crate (see `config::settings`), so `/asyncapi.yaml`
/// is rendered by hand rather than by adding one.
pub fn to_yaml(value: &Value) -> String {
    let mut out = String::new();
    write_yaml(value, 0, &mut out);
    out
}

fn write_yaml(value: &Value, indent: usize, out: &mut String) {
    match value {
        Value::Object(map) => {
            if map.is_empty() {
                out.push_str("{}\n");
                return;
            }
            for (key, val) in map {
                out.push_str(&"  ".repeat(indent));
                out.push_str(&yaml_key(key));
                out.push(':');
                write_yaml_value_inline_or_nested(val, indent, out);
            }
        }
        _ => write_yaml_scalar(value, out),
    }
}

fn write_yaml_value_inline_or_nested(value: &Value, indent: usize, out: &mut String) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            out.push('\n');
            write_yaml(value, indent + 1, out);
        }
        Value::Array(items) if !items.is_empty() => {
            out.push('\n');
            for item in items {
                out.push_str(&"  ".repeat(indent));
                out.push_str("- ");
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        out.push('\n');
                        write_yaml(item, indent + 1, out);
                    }
                    scalar => {
                        write_yaml_scalar(scalar, out);
                        out.push('\n');
                    }
                }
            }
        }
        Value::Object(_) => out.push_str(" {}\n"),
        Value::Array(_) => out.push_str(" []\n"),
        scalar => {
            out.push(' ');
            write_yaml_scalar(scalar, out);
            out.push('\n');
        }
    }
}

fn write_yaml_scalar(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&yaml_scalar_string(s)),
        _ => unreachable!("objects/arrays handled by the caller"),
    }
}

fn yaml_key(key: &str) -> String {
    if key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        key.to_string()
    } else {
        format!("\"{}\"", key.replace('"', "\\\""))
    }
}

fn yaml_scalar_string(s: &str) -> String {
    let needs_quoting = s.is_empty()
        || s.contains(['\n', ':', '#', '"', '\''])
        || matches!(s, "true" | "false" | "null" | "~")
        || s.parse::<f64>().is_ok();
    if needs_quoting {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

/// Wrap the rendered JSON document in a minimal static HTML viewer for `/asyncapi.html`.
pub fn to_html(spec_json: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>voice-core AsyncAPI</title>
<style>body {{ font-family: monospace; background: #1e1e1e; color: #d4d4d4; }}
pre {{ white-space: pre-wrap; padding: 1rem; }}</style>
</head>
<body>
<h1>voice-core streaming API (AsyncAPI 3.0.0)</h1>
<pre>{}</pre>
</body>
</html>"#,
        html_escape(spec_json)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_has_asyncapi_version_and_both_asr_channels() {
        let spec = build_asyncapi_spec();
        assert_eq!(spec["asyncapi"], "3.0.0");
        assert!(spec["channels"].get("/ws/asr/stream").is_some());
        assert!(spec["channels"].get("/ws/asr/binary").is_some());
        assert!(spec["components"]["messages"].get("TranscriptionResult").is_some());
    }

    #[test]
    fn yaml_round_trips_basic_shapes_without_panicking() {
        let spec = build_asyncapi_spec();
        let yaml = to_yaml(&spec);
        assert!(yaml.contains("asyncapi:"));
        assert!(yaml.contains("3.0.0"));
    }

    #[test]
    fn html_escapes_angle_brackets() {
        let html = to_html("{\"a\": \"<script>\"}");
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
