use std::time::Duration;

use serde::{Deserialize, Serialize};
pub use silero::{VadConfig, VadSession, VadTransition};

#[derive(Debug, thiserror::Error)]
pub enum VadError {
    #[error("unsupported sample rate: {0} (expected 8000 or 16000)")]
    UnsupportedSampleRate(u32),
    #[error("session creation failed: {0}")]
    SessionCreationFailed(String),
    #[error("inference error: {0}")]
    InferenceError(String),
}

pub type Result<T> = std::result::Result<T, VadError>;

/// Timing knobs for speech segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadSettings {
    /// Silence required before speech is considered over.
    pub redemption_ms: u32,
    /// Audio kept before speech start.
    pub pre_speech_pad_ms: u32,
    /// Audio kept after speech end.
    pub post_speech_pad_ms: u32,
    /// Shorter bursts are discarded.
    pub min_speech_ms: u32,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            redemption_ms: 500,
            pre_speech_pad_ms: 200,
            post_speech_pad_ms: 200,
            min_speech_ms: 100,
        }
    }
}

impl VadSettings {
    pub fn to_config(self, sample_rate: u32) -> VadConfig {
        VadConfig {
            sample_rate: sample_rate as usize,
            redemption_time: Duration::from_millis(self.redemption_ms as u64),
            pre_speech_pad: Duration::from_millis(self.pre_speech_pad_ms as u64),
            post_speech_pad: Duration::from_millis(self.post_speech_pad_ms as u64),
            min_speech_time: Duration::from_millis(self.min_speech_ms as u64),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VadEvent {
    SpeechStart { timestamp_ms: u64 },
    SpeechEnd { start_ms: u64, end_ms: u64 },
}

/// Anything that can segment a mono stream into speech and silence.
pub trait VoiceActivityDetector: Send {
    /// Rate the detector expects its input at.
    fn sample_rate(&self) -> u32;
    fn detect(&mut self, audio: &[f32]) -> Result<Vec<VadEvent>>;
    fn reset(&mut self);
}

pub struct SileroVad {
    session: VadSession,
    sample_rate: u32,
    settings: VadSettings,
}

impl SileroVad {
    pub fn new(sample_rate: u32) -> Result<Self> {
        Self::with_settings(sample_rate, VadSettings::default())
    }

    pub fn with_settings(sample_rate: u32, settings: VadSettings) -> Result<Self> {
        if sample_rate != 8000 && sample_rate != 16000 {
            return Err(VadError::UnsupportedSampleRate(sample_rate));
        }
        let session = VadSession::new(settings.to_config(sample_rate))
            .map_err(|e| VadError::SessionCreationFailed(e.to_string()))?;

        tracing::debug!(sample_rate, ?settings, "Silero VAD ready");
        Ok(Self {
            session,
            sample_rate,
            settings,
        })
    }

    pub fn settings(&self) -> VadSettings {
        self.settings
    }

    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<VadEvent>> {
        let transitions = self
            .session
            .process(samples)
            .map_err(|e| VadError::InferenceError(e.to_string()))?;

        Ok(transitions.into_iter().map(VadEvent::from).collect())
    }
}

impl From<VadTransition> for VadEvent {
    fn from(t: VadTransition) -> Self {
        match t {
            VadTransition::SpeechStart { timestamp_ms } => VadEvent::SpeechStart {
                timestamp_ms: timestamp_ms as u64,
            },
            VadTransition::SpeechEnd {
                start_timestamp_ms,
                end_timestamp_ms,
                ..
            } => VadEvent::SpeechEnd {
                start_ms: start_timestamp_ms as u64,
                end_ms: end_timestamp_ms as u64,
            },
        }
    }
}

impl VoiceActivityDetector for SileroVad {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn detect(&mut self, audio: &[f32]) -> Result<Vec<VadEvent>> {
        self.process(audio)
    }

    fn reset(&mut self) {
        self.session.reset();
    }
}
