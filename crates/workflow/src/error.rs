//! `WorkflowError` — failure modes of the nine-stage pipeline itself (as opposed to a handler's
//! own `IntentResult::failure`), mapped onto the shared wire taxonomy (§7).
//!
//! Grounded in idiom on the donor's `voice-agent-rust` pipeline variant's `PipelineError -> Error`
//! mapping (`crates/pipeline/src/lib.rs` in that variant): one `thiserror` enum, one exhaustive
//! match into the shared kind enum, nothing fancier.

use thiserror::Error;

use voice_core::error::{AsErrorKind, ErrorKind};

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("component not available: {0}")]
    ComponentNotAvailable(String),

    #[error("voice trigger failed: {0}")]
    VoiceTriggerFailed(String),

    #[error("resampling failed: {0}")]
    ResamplingFailed(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("speech synthesis failed: {0}")]
    TtsFailed(String),
}

impl AsErrorKind for WorkflowError {
    fn as_error_kind(&self) -> ErrorKind {
        match self {
            WorkflowError::ComponentNotAvailable(_) => ErrorKind::ComponentNotAvailable,
            WorkflowError::VoiceTriggerFailed(_) => ErrorKind::VoiceTriggerFailed,
            WorkflowError::ResamplingFailed(_) => ErrorKind::ResamplingFailed,
            WorkflowError::TranscriptionFailed(_) => ErrorKind::TranscriptionFailed,
            WorkflowError::TtsFailed(_) => ErrorKind::TtsFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_maps_to_its_matching_kind() {
        assert_eq!(
            WorkflowError::ComponentNotAvailable("asr".into()).as_error_kind(),
            ErrorKind::ComponentNotAvailable
        );
        assert_eq!(
            WorkflowError::VoiceTriggerFailed("x".into()).as_error_kind(),
            ErrorKind::VoiceTriggerFailed
        );
        assert_eq!(
            WorkflowError::ResamplingFailed("x".into()).as_error_kind(),
            ErrorKind::ResamplingFailed
        );
        assert_eq!(
            WorkflowError::TranscriptionFailed("x".into()).as_error_kind(),
            ErrorKind::TranscriptionFailed
        );
        assert_eq!(WorkflowError::TtsFailed("x".into()).as_error_kind(), ErrorKind::TtsFailed);
    }

    #[test]
    fn display_includes_the_detail_message() {
        let err = WorkflowError::TranscriptionFailed("provider timed out".to_string());
        assert!(err.to_string().contains("provider timed out"));
    }
}
