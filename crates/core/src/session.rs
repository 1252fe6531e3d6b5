//! Session id generation, validation, and room extraction (§3, §4.8).
//!
//! Ported algorithm-for-algorithm from the original implementation's session manager: room id is
//! the primary key when available (single-user, multi-room deployments), falling back to client
//! id, falling back to a generated id scoped to the input source.

use uuid::Uuid;

const SESSION_SUFFIX: &str = "_session";

/// Generate a session id from a room id (preferred), a client id, or a source-scoped random
/// fallback, in that priority order.
pub fn generate_session_id(source: &str, room_id: Option<&str>, client_id: Option<&str>) -> String {
    if let Some(room) = room_id.filter(|r| !r.is_empty()) {
        return format!("{room}{SESSION_SUFFIX}");
    }
    if let Some(client) = client_id.filter(|c| !c.is_empty()) {
        return format!("{client}{SESSION_SUFFIX}");
    }
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{source}_{}{SESSION_SUFFIX}", &suffix[..8])
}

/// A session id is valid iff it carries the `_session` suffix and is long enough to carry an
/// actual identifier in front of it.
pub fn is_valid_session_id(session_id: &str) -> bool {
    session_id.contains(SESSION_SUFFIX) && session_id.len() > 8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    Room,
    Client,
    Generated,
    Unknown,
}

/// Classify a session id by how it was constructed. A generated fallback id ends in an 8-hex
/// digest right before the `_session` suffix; room/client ids do not look like that by
/// construction (room and client ids are operator-chosen strings, not hex digests).
pub fn get_session_type(session_id: &str) -> SessionType {
    if !is_valid_session_id(session_id) {
        return SessionType::Unknown;
    }
    let body = &session_id[..session_id.len() - SESSION_SUFFIX.len()];
    if looks_like_generated_suffix(body) {
        SessionType::Generated
    } else if body.contains('_') {
        // `{source}_{8hex}` already excluded above; anything else with an underscore before the
        // suffix is treated as a room id embedding structure of its own (e.g. "kitchen_2").
        SessionType::Room
    } else {
        SessionType::Room
    }
}

fn looks_like_generated_suffix(body: &str) -> bool {
    match body.rsplit_once('_') {
        Some((_, tail)) if tail.len() == 8 => tail.chars().all(|c| c.is_ascii_hexdigit()),
        _ => false,
    }
}

/// Extract the room id component from a session id, returning it only when it does not look
/// like the generated-fallback's random hex suffix (a room id is never an 8-hex-digit string by
/// construction in this core, so the check is a reasonable proxy for "isn't a UUID fragment").
pub fn extract_room_from_session(session_id: &str) -> Option<String> {
    if !is_valid_session_id(session_id) {
        return None;
    }
    let body = &session_id[..session_id.len() - SESSION_SUFFIX.len()];
    if looks_like_generated_suffix(body) {
        return None;
    }
    let room_part = body.rsplit_once('_').map(|(_, tail)| tail).unwrap_or(body);
    if room_part.len() == 8 && room_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_takes_priority() {
        let id = generate_session_id("web", Some("kitchen"), Some("client-1"));
        assert_eq!(id, "kitchen_session");
    }

    #[test]
    fn falls_back_to_client_id() {
        let id = generate_session_id("web", None, Some("client-1"));
        assert_eq!(id, "client-1_session");
    }

    #[test]
    fn falls_back_to_generated_id() {
        let id = generate_session_id("web", None, None);
        assert!(id.starts_with("web_"));
        assert!(id.ends_with("_session"));
    }

    #[test]
    fn extract_room_round_trips_for_non_numeric_room() {
        let id = generate_session_id("web", Some("kitchen"), None);
        assert_eq!(extract_room_from_session(&id).as_deref(), Some("kitchen"));
    }

    #[test]
    fn extract_room_returns_none_for_generated_fallback() {
        let id = generate_session_id("web", None, None);
        assert_eq!(extract_room_from_session(&id), None);
    }

    #[test]
    fn validation_requires_suffix_and_length() {
        assert!(!is_valid_session_id("short"));
        assert!(!is_valid_session_id("nosuffixhere"));
        assert!(is_valid_session_id("kitchen_session"));
    }
}
