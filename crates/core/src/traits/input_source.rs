//! `InputSource` — an origin of raw text/audio requests the input manager multiplexes (§4.2).

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputSourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("source closed")]
    Closed,
}

/// One piece of raw input handed from a source into the workflow (§4.2, §4.3).
#[derive(Debug, Clone)]
pub enum RawInput {
    Text { session_id: String, text: String },
    Audio {
        session_id: String,
        audio: crate::audio::AudioData,
    },
}

impl RawInput {
    pub fn session_id(&self) -> &str {
        match self {
            RawInput::Text { session_id, .. } => session_id,
            RawInput::Audio { session_id, .. } => session_id,
        }
    }
}

/// An input channel (CLI, microphone, web) the input manager polls or subscribes to (§4.2). Each
/// source is independent: a source's unavailability does not block the others, per the
/// graceful-degradation rule in §4.1.
#[async_trait]
pub trait InputSource: Send + Sync {
    /// Stable name, e.g. `"cli"`, `"microphone"`, `"web"`.
    fn name(&self) -> &str;

    async fn start(&mut self) -> Result<(), InputSourceError>;

    async fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// A stream of inputs from this source. Implementations should end the stream (rather than
    /// error) on an orderly `stop()`.
    fn subscribe<'a>(&'a self) -> Pin<Box<dyn Stream<Item = RawInput> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioData, Channels, SampleRate};

    #[test]
    fn raw_input_session_id_both_variants() {
        let text = RawInput::Text {
            session_id: "s1".into(),
            text: "hi".into(),
        };
        assert_eq!(text.session_id(), "s1");

        let audio = RawInput::Audio {
            session_id: "s2".into(),
            audio: AudioData::new(vec![0u8; 4], SampleRate::Hz16000, Channels::Mono),
        };
        assert_eq!(audio.session_id(), "s2");
    }
}
