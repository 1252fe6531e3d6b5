//! Shared error-kind taxonomy (§7) and the core crate's own error type.
//!
//! Every subsystem crate (`config`, `audio`, `intents`, `runtime`, `workflow`, `server`) defines
//! its own `thiserror` enum for its internal failure modes, but every variant that is meant to be
//! user-visible maps to exactly one of the kinds enumerated here via `ErrorKind::as_str`, which
//! is what ends up in `IntentResult.error` / `CommandResponse.error` on the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The stable, wire-visible error kinds from §7. Deliberately a flat enum of kinds, not a class
/// hierarchy: the taxonomy is about what went wrong, not where in the type system it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ConfigurationInvalid,
    ComponentNotAvailable,
    NoHandler,
    HandlerUnavailable,
    NoActiveActions,
    NoCapableHandlers,
    AmbiguousTarget,
    RequiresConfirmation,
    ResamplingFailed,
    SampleRateMismatch,
    TranscriptionFailed,
    TtsFailed,
    VoiceTriggerFailed,
    ExecutionError,
    TraceOverflow,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ConfigurationInvalid => "configuration_invalid",
            ErrorKind::ComponentNotAvailable => "component_not_available",
            ErrorKind::NoHandler => "no_handler",
            ErrorKind::HandlerUnavailable => "handler_unavailable",
            ErrorKind::NoActiveActions => "no_active_actions",
            ErrorKind::NoCapableHandlers => "no_capable_handlers",
            ErrorKind::AmbiguousTarget => "ambiguous_target",
            ErrorKind::RequiresConfirmation => "requires_confirmation",
            ErrorKind::ResamplingFailed => "resampling_failed",
            ErrorKind::SampleRateMismatch => "sample_rate_mismatch",
            ErrorKind::TranscriptionFailed => "transcription_failed",
            ErrorKind::TtsFailed => "tts_failed",
            ErrorKind::VoiceTriggerFailed => "voice_trigger_failed",
            ErrorKind::ExecutionError => "execution_error",
            ErrorKind::TraceOverflow => "trace_overflow",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every subsystem error enum so call sites can go straight from "a thing failed"
/// to "the wire-visible kind", without re-deriving it from the `Display` string.
pub trait AsErrorKind {
    fn as_error_kind(&self) -> ErrorKind;
}

/// Failures intrinsic to the core data model itself (as opposed to a subsystem built on top of
/// it) — malformed donations, out-of-range confidence, invalid session ids.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("confidence {0} is outside [0, 1]")]
    InvalidConfidence(f32),

    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("donation manifest invalid: {0}")]
    InvalidDonation(String),
}

impl AsErrorKind for CoreError {
    fn as_error_kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidConfidence(_) => ErrorKind::ExecutionError,
            CoreError::InvalidSessionId(_) => ErrorKind::ConfigurationInvalid,
            CoreError::InvalidDonation(_) => ErrorKind::ConfigurationInvalid,
        }
    }
}
