//! Sample-rate conversion.

use rubato::{FftFixedIn, Resampler as RubatoResampler};

use crate::{AudioError, Result};

/// Wrapper for rubato's FFT resampler with buffering for variable input sizes.
///
/// Input that does not fill a whole chunk is held until the next call.
pub struct SincResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<f32>,
    chunk_size: usize,
    from_rate: u32,
    to_rate: u32,
}

impl SincResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Result<Self> {
        if from_rate == 0 || to_rate == 0 {
            return Err(AudioError::Resampler("sample rates must be > 0".to_string()));
        }
        // ~10ms at the source rate keeps latency low
        let chunk_size = (from_rate as usize / 100).max(64);

        let resampler = FftFixedIn::<f32>::new(
            from_rate as usize,
            to_rate as usize,
            chunk_size,
            2, // Sub-chunks for better quality
            1, // Mono channel
        )
        .map_err(|e| AudioError::Resampler(e.to_string()))?;

        Ok(Self {
            resampler,
            input_buffer: Vec::with_capacity(chunk_size * 2),
            chunk_size,
            from_rate,
            to_rate,
        })
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn to_rate(&self) -> u32 {
        self.to_rate
    }

    /// Process mono samples and return whatever output is ready.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        self.input_buffer.extend_from_slice(samples);

        let mut output = Vec::new();
        while self.input_buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..self.chunk_size).collect();

            match self.resampler.process(&[chunk], None) {
                Ok(resampled) => {
                    if let Some(channel) = resampled.first() {
                        output.extend_from_slice(channel);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Resampler chunk failed"),
            }
        }

        output
    }

    /// Drop buffered input and filter state.
    pub fn reset(&mut self) {
        self.input_buffer.clear();
        self.resampler.reset();
    }
}

impl std::fmt::Debug for SincResampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SincResampler")
            .field("from_rate", &self.from_rate)
            .field("to_rate", &self.to_rate)
            .field("buffered", &self.input_buffer.len())
            .finish()
    }
}

/// Linear interpolation resampling for one-shot conversions.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx.fract() as f32;
        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }
    output
}
