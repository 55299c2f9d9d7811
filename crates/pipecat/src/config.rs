use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{PluginError, Result};

/// Construction settings for `PipecatSmartTurnDetector`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Smart Turn ONNX file. `None` uses the downloaded default model.
    pub model_path: Option<PathBuf>,
    /// Rate of the frames the session appends.
    pub sample_rate: u32,
    /// Probabilities below this mean the user is unlikely to be done.
    pub unlikely_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            sample_rate: turnkit_audio::SAMPLE_RATE,
            unlikely_threshold: 0.5,
        }
    }
}

impl DetectorConfig {
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_unlikely_threshold(mut self, threshold: f32) -> Self {
        self.unlikely_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PluginError::InvalidConfig(
                "sample_rate must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.unlikely_threshold) {
            return Err(PluginError::InvalidConfig(format!(
                "unlikely_threshold must be within [0, 1], got {}",
                self.unlikely_threshold
            )));
        }
        Ok(())
    }

    /// The configured model, or the default Smart Turn download location.
    pub fn resolved_model_path(&self) -> PathBuf {
        self.model_path
            .clone()
            .unwrap_or_else(turnkit_models::default_model_path)
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    /// Whether `probability` says the turn has probably not ended.
    pub fn is_unlikely_end(&self, probability: f32) -> bool {
        probability < self.unlikely_threshold
    }
}
