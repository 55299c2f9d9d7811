use std::time::Duration;

use async_trait::async_trait;
use turnkit_audio::AudioFrame;

use crate::ChatContext;

/// Contract every turn detection strategy fulfils for `AgentSession`.
///
/// Text-based detectors score the chat context; audio-based ones report
/// `is_audio_turn_detector() == true` and are fed the user's speech frames.
#[async_trait]
pub trait EndOfTurnDetector: Send + Sync {
    fn model(&self) -> &str;

    fn provider(&self) -> &str;

    fn is_audio_turn_detector(&self) -> bool {
        false
    }

    /// Called with every frame while the user is speaking.
    fn append_audio(&self, _frame: &AudioFrame) {}

    fn clear_buffer(&self) {}

    /// Probability below which the turn is judged unlikely to have ended.
    async fn unlikely_threshold(&self, language: Option<&str>) -> Option<f32>;

    async fn supports_language(&self, language: Option<&str>) -> bool;

    /// End-of-turn probability in [0, 1].
    async fn predict_end_of_turn(&self, chat_ctx: &ChatContext, timeout: Option<Duration>) -> f32;
}
