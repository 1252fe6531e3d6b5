//! `ServerError` — failures at the HTTP/WebSocket boundary itself, distinct from an `IntentResult`
//! failure produced deep in the pipeline (those are carried in the response body, not this type).

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("audio file too large (max {max_mb:.1}MB)")]
    AudioTooLarge { max_mb: f64 },

    #[error("component not found: {0}")]
    ComponentNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::AudioTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::ComponentNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from(&self);
        let body = serde_json::json!({ "success": false, "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
