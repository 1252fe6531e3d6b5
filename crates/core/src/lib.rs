//! Core types and traits shared across the workspace.
//!
//! This crate provides the foundational data model — the things every other crate agrees on the
//! shape of — but no concrete engines: pluggable traits for speech/resampling/components live
//! here, their implementations live in `audio`, `intents`, `runtime`, and `workflow`.

pub mod audio;
pub mod context;
pub mod donation;
pub mod error;
pub mod intent;
pub mod session;
pub mod trace;
pub mod traits;

pub use audio::{AudioData, AudioEncoding, Channels, SampleRate, VoiceSegment};
pub use context::{
    default_session_timeout_secs, ActiveAction, DisambiguationContext, Turn, TurnRole,
    UnifiedConversationContext, DISAMBIGUATION_TTL_SECS,
};
pub use donation::{Donation, DonationExample, MethodDonation, ParameterSpec, ParameterType};
pub use error::{AsErrorKind, CoreError, ErrorKind};
pub use intent::{Intent, IntentResult, CONTEXTUAL_DOMAIN};
pub use session::{
    extract_room_from_session, generate_session_id, get_session_type, is_valid_session_id,
    SessionType,
};
pub use trace::{StageTrace, TraceContext};
