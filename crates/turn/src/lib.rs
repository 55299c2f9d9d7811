//! End-of-turn primitives shared by every turn detection backend.

use serde::{Deserialize, Serialize};

/// Model output paired with the threshold it is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnPrediction {
    pub probability: f32,
    pub threshold: f32,
}

impl TurnPrediction {
    pub fn new(probability: f32, threshold: f32) -> Self {
        Self {
            probability,
            threshold,
        }
    }

    /// A probability equal to the threshold counts as a finished turn.
    pub fn is_complete(&self) -> bool {
        self.probability >= self.threshold
    }

    pub fn state(&self) -> EndOfTurnState {
        if self.is_complete() {
            EndOfTurnState::Complete
        } else {
            EndOfTurnState::Incomplete
        }
    }
}

/// Verdict of an audio analyzer for the current speech segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfTurnState {
    Complete,
    Incomplete,
}

impl EndOfTurnState {
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("model not loaded")]
    ModelNotLoaded,
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, TurnError>;

/// A model that scores 16 kHz mono audio for end-of-turn likelihood.
pub trait TurnDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn predict_endpoint_probability(&self, audio_16k_mono: &[f32]) -> Result<f32>;
}
