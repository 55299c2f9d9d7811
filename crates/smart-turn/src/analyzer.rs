//! Buffering and end-of-turn analysis around a Smart Turn model.
//!
//! Audio is appended chunk by chunk together with the caller's speech flag.
//! Silence after speech is accumulated so a long pause ends the turn without
//! running the model; otherwise `analyze_end_of_turn` scores the current
//! speech segment.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use turnkit_audio::{pcm16_to_f32, SincResampler};
use turnkit_turn::{EndOfTurnState, TurnDetector};

use crate::features::SAMPLE_RATE as MODEL_SAMPLE_RATE;
use crate::SmartTurnError;

/// The classifier's own decision boundary: strictly above means complete.
pub const PREDICTION_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartTurnParams {
    /// Silence after speech that ends the turn outright.
    pub stop_secs: f32,
    /// Audio kept before the first speech chunk.
    pub pre_speech_ms: f32,
    /// Longest segment passed to the model.
    pub max_duration_secs: f32,
}

impl Default for SmartTurnParams {
    fn default() -> Self {
        Self {
            stop_secs: 3.0,
            pre_speech_ms: 0.0,
            max_duration_secs: 8.0,
        }
    }
}

/// Timing and outcome of one model run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmartTurnMetrics {
    pub is_complete: bool,
    pub probability: f32,
    pub inference_time_ms: f64,
    pub e2e_processing_time_ms: f64,
}

struct Chunk {
    /// Position of the first sample on the analyzer clock (16 kHz samples).
    start: u64,
    samples: Vec<f32>,
}

pub struct SmartTurnAnalyzer {
    model: Arc<dyn TurnDetector>,
    params: SmartTurnParams,
    sample_rate: u32,
    resampler: Option<SincResampler>,
    buffer: VecDeque<Chunk>,
    clock: u64,
    speech_triggered: bool,
    speech_start: Option<u64>,
    silence_ms: f64,
}

impl SmartTurnAnalyzer {
    /// `sample_rate` is the rate of the audio handed to `append_*`; anything
    /// other than 16 kHz is resampled before buffering.
    pub fn new(
        model: Arc<dyn TurnDetector>,
        sample_rate: u32,
        params: SmartTurnParams,
    ) -> Result<Self, SmartTurnError> {
        if sample_rate == 0 {
            return Err(SmartTurnError::InvalidInput(
                "sample rate must be > 0".to_string(),
            ));
        }
        let resampler = if sample_rate as usize != MODEL_SAMPLE_RATE {
            tracing::debug!(
                from = sample_rate,
                to = MODEL_SAMPLE_RATE,
                "Smart Turn input will be resampled"
            );
            Some(
                SincResampler::new(sample_rate, MODEL_SAMPLE_RATE as u32)
                    .map_err(|e| SmartTurnError::InvalidInput(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(Self {
            model,
            params,
            sample_rate,
            resampler,
            buffer: VecDeque::new(),
            clock: 0,
            speech_triggered: false,
            speech_start: None,
            silence_ms: 0.0,
        })
    }

    pub fn params(&self) -> SmartTurnParams {
        self.params
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn speech_triggered(&self) -> bool {
        self.speech_triggered
    }

    pub fn silence_ms(&self) -> f64 {
        self.silence_ms
    }

    /// Buffered audio in milliseconds of model-rate samples.
    pub fn buffered_ms(&self) -> u64 {
        let samples: usize = self.buffer.iter().map(|c| c.samples.len()).sum();
        samples as u64 * 1000 / MODEL_SAMPLE_RATE as u64
    }

    /// Append little-endian PCM16 mono audio.
    pub fn append_audio(&mut self, pcm16: &[u8], is_speech: bool) -> EndOfTurnState {
        let samples = pcm16_to_f32(pcm16);
        self.append_samples(&samples, is_speech)
    }

    /// Append mono samples at the analyzer's input rate.
    pub fn append_samples(&mut self, samples: &[f32], is_speech: bool) -> EndOfTurnState {
        let chunk_ms = samples.len() as f64 * 1000.0 / self.sample_rate as f64;
        let resampled = match self.resampler.as_mut() {
            Some(r) => r.process(samples),
            None => samples.to_vec(),
        };

        let start = self.clock;
        self.clock += resampled.len() as u64;
        if !resampled.is_empty() {
            self.buffer.push_back(Chunk {
                start,
                samples: resampled,
            });
        }

        if is_speech {
            self.silence_ms = 0.0;
            self.speech_triggered = true;
            if self.speech_start.is_none() {
                self.speech_start = Some(start);
            }
            return EndOfTurnState::Incomplete;
        }

        if self.speech_triggered {
            self.silence_ms += chunk_ms;
            if self.silence_ms >= self.params.stop_secs as f64 * 1000.0 {
                tracing::debug!(
                    silence_ms = self.silence_ms,
                    "Smart Turn silence timeout, ending turn"
                );
                self.clear_with(EndOfTurnState::Complete);
                return EndOfTurnState::Complete;
            }
        } else {
            self.trim_pre_speech();
        }
        EndOfTurnState::Incomplete
    }

    /// Score the current speech segment. The buffer is cleared afterwards so
    /// only the most recent VAD segment is ever analyzed.
    pub fn analyze_end_of_turn(
        &mut self,
    ) -> Result<(EndOfTurnState, Option<SmartTurnMetrics>), SmartTurnError> {
        let started = Instant::now();
        let Some(segment) = self.speech_segment() else {
            return Ok((EndOfTurnState::Incomplete, None));
        };

        let inference_start = Instant::now();
        let probability = self
            .model
            .predict_endpoint_probability(&segment)
            .map_err(|e| SmartTurnError::Inference(e.to_string()))?;
        let inference_time_ms = inference_start.elapsed().as_secs_f64() * 1000.0;

        let state = if probability > PREDICTION_THRESHOLD {
            EndOfTurnState::Complete
        } else {
            EndOfTurnState::Incomplete
        };
        self.clear_with(state);

        let metrics = SmartTurnMetrics {
            is_complete: state.is_complete(),
            probability,
            inference_time_ms,
            e2e_processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        };
        tracing::trace!(
            probability,
            samples = segment.len(),
            inference_ms = inference_time_ms,
            "Smart Turn analysis"
        );
        Ok((state, Some(metrics)))
    }

    /// Drop buffered audio and speech tracking.
    pub fn clear(&mut self) {
        self.clear_with(EndOfTurnState::Complete);
        if let Some(r) = self.resampler.as_mut() {
            r.reset();
        }
    }

    /// After an incomplete verdict the speaker is still mid-turn, so further
    /// silence keeps counting toward `stop_secs`.
    fn clear_with(&mut self, state: EndOfTurnState) {
        self.speech_triggered = state == EndOfTurnState::Incomplete;
        self.buffer.clear();
        self.speech_start = None;
        self.silence_ms = 0.0;
    }

    fn trim_pre_speech(&mut self) {
        let keep_secs = self.params.pre_speech_ms as f64 / 1000.0
            + self.params.stop_secs as f64
            + self.params.max_duration_secs as f64;
        let keep = (keep_secs * MODEL_SAMPLE_RATE as f64) as u64;
        let horizon = self.clock.saturating_sub(keep);
        while self.buffer.front().is_some_and(|c| c.start < horizon) {
            self.buffer.pop_front();
        }
    }

    fn speech_segment(&self) -> Option<Vec<f32>> {
        let pre = (self.params.pre_speech_ms as f64 / 1000.0 * MODEL_SAMPLE_RATE as f64) as u64;
        let from = self
            .speech_start
            .map_or(0, |start| start.saturating_sub(pre));

        // Cut at sample granularity: the chunk straddling `from` is sliced.
        let mut segment = Vec::new();
        for chunk in &self.buffer {
            let end = chunk.start + chunk.samples.len() as u64;
            if end <= from {
                continue;
            }
            let skip = from.saturating_sub(chunk.start) as usize;
            segment.extend_from_slice(&chunk.samples[skip..]);
        }

        let max_samples = (self.params.max_duration_secs as f64 * MODEL_SAMPLE_RATE as f64) as usize;
        if segment.len() > max_samples {
            segment.drain(..segment.len() - max_samples);
        }

        if segment.is_empty() {
            None
        } else {
            Some(segment)
        }
    }
}

impl std::fmt::Debug for SmartTurnAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartTurnAnalyzer")
            .field("model", &self.model.name())
            .field("sample_rate", &self.sample_rate)
            .field("params", &self.params)
            .field("buffered_ms", &self.buffered_ms())
            .field("speech_triggered", &self.speech_triggered)
            .field("silence_ms", &self.silence_ms)
            .finish()
    }
}
