//! `audio.stop` — the seed handler contextual `stop` commands resolve to when audio playback is
//! the active action (§4.6, §8). Minimal on purpose: this core's non-goals exclude an actual
//! audio playback backend, so stopping just clears the active-action record.

use async_trait::async_trait;

use voice_core::traits::{IntentHandler, IntentPattern};
use voice_core::{Intent, IntentResult, UnifiedConversationContext};

const ACTION_NAME: &str = "audio_playback";

pub struct AudioHandler {
    patterns: Vec<IntentPattern>,
}

impl Default for AudioHandler {
    fn default() -> Self {
        Self {
            patterns: vec![IntentPattern::new("audio", "play"), IntentPattern::new("audio", "stop")],
        }
    }
}

impl AudioHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentHandler for AudioHandler {
    fn name(&self) -> &str {
        "audio"
    }

    fn patterns(&self) -> &[IntentPattern] {
        &self.patterns
    }

    fn is_destructive(&self, action: &str) -> bool {
        action == "stop"
    }

    async fn execute(&self, intent: &Intent, context: &mut UnifiedConversationContext) -> IntentResult {
        match intent.action.as_str() {
            "play" => {
                let track = intent
                    .entities
                    .get("track")
                    .and_then(|v| v.as_str())
                    .unwrap_or("audio");
                context.register_active_action(ACTION_NAME, "audio", "audio");
                IntentResult::success(format!("playing {track}"))
            }
            "stop" => {
                if context.complete_active_action(ACTION_NAME).is_some() {
                    IntentResult::success("stopped playback")
                } else {
                    IntentResult::failure("no_active_playback", "nothing is playing")
                }
            }
            other => IntentResult::failure("unsupported_action", format!("audio does not support '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn playing_registers_active_action() {
        let handler = AudioHandler::new();
        let intent = Intent::new("audio", "play", "play some music", "s1", 0.9);
        let mut context = UnifiedConversationContext::new("s1");

        let result = handler.execute(&intent, &mut context).await;
        assert!(result.success);
        assert!(context.active_actions().contains_key(ACTION_NAME));
    }

    #[tokio::test]
    async fn stopping_without_playback_fails() {
        let handler = AudioHandler::new();
        let intent = Intent::new("audio", "stop", "stop", "s1", 0.9);
        let mut context = UnifiedConversationContext::new("s1");

        let result = handler.execute(&intent, &mut context).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn stopping_after_play_clears_the_active_action() {
        let handler = AudioHandler::new();
        let mut context = UnifiedConversationContext::new("s1");
        let play = Intent::new("audio", "play", "play some music", "s1", 0.9);
        handler.execute(&play, &mut context).await;

        let stop = Intent::new("audio", "stop", "stop", "s1", 0.9);
        let result = handler.execute(&stop, &mut context).await;

        assert!(result.success);
        assert!(!context.active_actions().contains_key(ACTION_NAME));
    }

    #[test]
    fn stop_action_is_destructive() {
        let handler = AudioHandler::new();
        assert!(handler.is_destructive("stop"));
        assert!(!handler.is_destructive("play"));
    }
}
