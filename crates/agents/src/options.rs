use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use turnkit_vad::VadSettings;

use crate::{Result, SessionError};

/// Endpointing and VAD configuration for an `AgentSession`.
///
/// ```toml
/// min_endpointing_delay = 0.5
/// max_endpointing_delay = 6.0
/// language = "en"
///
/// [vad]
/// redemption_ms = 500
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Seconds to wait after speech ends when the turn is likely over.
    pub min_endpointing_delay: f32,
    /// Seconds to wait when the turn detector says the user may continue.
    pub max_endpointing_delay: f32,
    pub language: Option<String>,
    /// Passed through to `predict_end_of_turn`.
    pub prediction_timeout_ms: Option<u64>,
    pub vad_sample_rate: u32,
    pub vad: VadSettings,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            min_endpointing_delay: 0.5,
            max_endpointing_delay: 6.0,
            language: None,
            prediction_timeout_ms: None,
            vad_sample_rate: turnkit_audio::SAMPLE_RATE,
            vad: VadSettings::default(),
        }
    }
}

impl SessionOptions {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let options: Self = toml::from_str(s)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_endpointing_delay.is_finite() || self.min_endpointing_delay < 0.0 {
            return Err(SessionError::InvalidOptions(format!(
                "min_endpointing_delay must be >= 0, got {}",
                self.min_endpointing_delay
            )));
        }
        if !self.max_endpointing_delay.is_finite()
            || self.max_endpointing_delay < self.min_endpointing_delay
        {
            return Err(SessionError::InvalidOptions(format!(
                "max_endpointing_delay ({}) must be >= min_endpointing_delay ({})",
                self.max_endpointing_delay, self.min_endpointing_delay
            )));
        }
        if self.vad_sample_rate != 8000 && self.vad_sample_rate != 16000 {
            return Err(SessionError::InvalidOptions(format!(
                "vad_sample_rate must be 8000 or 16000, got {}",
                self.vad_sample_rate
            )));
        }
        Ok(())
    }

    pub fn min_delay_ms(&self) -> u64 {
        (self.min_endpointing_delay as f64 * 1000.0).round() as u64
    }

    pub fn max_delay_ms(&self) -> u64 {
        (self.max_endpointing_delay as f64 * 1000.0).round() as u64
    }

    pub fn prediction_timeout(&self) -> Option<Duration> {
        self.prediction_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = SessionOptions::default();
        assert_eq!(o.min_delay_ms(), 500);
        assert_eq!(o.max_delay_ms(), 6000);
        assert!(o.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let o = SessionOptions::from_toml_str(
            r#"
            max_endpointing_delay = 3.0
            language = "es"

            [vad]
            redemption_ms = 300
            "#,
        )
        .unwrap();
        assert_eq!(o.max_delay_ms(), 3000);
        assert_eq!(o.min_delay_ms(), 500);
        assert_eq!(o.language.as_deref(), Some("es"));
        assert_eq!(o.vad.redemption_ms, 300);
        assert_eq!(o.vad.min_speech_ms, 100);
    }

    #[test]
    fn test_inverted_delays_rejected() {
        let err = SessionOptions::from_toml_str("min_endpointing_delay = 2.0\nmax_endpointing_delay = 1.0")
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidOptions(_)));
    }

    #[test]
    fn test_bad_vad_rate_rejected() {
        assert!(SessionOptions::from_toml_str("vad_sample_rate = 44100").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(&path, "prediction_timeout_ms = 250\n").unwrap();
        let o = SessionOptions::from_file(&path).unwrap();
        assert_eq!(o.prediction_timeout(), Some(Duration::from_millis(250)));
    }
}
