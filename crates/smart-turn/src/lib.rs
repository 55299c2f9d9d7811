//! Smart Turn v3 semantic endpoint detection.
//!
//! Uses a small on-device model to predict whether a speech pause is a true
//! end-of-turn or just a mid-utterance pause.

mod analyzer;
pub mod features;
mod model;

use std::path::PathBuf;

pub use analyzer::{SmartTurnAnalyzer, SmartTurnMetrics, SmartTurnParams, PREDICTION_THRESHOLD};
pub use model::SmartTurnModel;

#[derive(Debug, thiserror::Error)]
pub enum SmartTurnError {
    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),
    #[error("failed to load model: {0}")]
    Model(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, SmartTurnError>;
