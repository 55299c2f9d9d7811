//! Interleaved PCM16 frames and sample conversions.

use crate::{AudioError, Result};

/// A chunk of interleaved 16-bit PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub data: Vec<i16>,
    pub sample_rate: u32,
    pub num_channels: u32,
    pub samples_per_channel: u32,
}

impl AudioFrame {
    pub fn new(data: Vec<i16>, sample_rate: u32, num_channels: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidFrame("sample rate must be > 0".to_string()));
        }
        if num_channels == 0 {
            return Err(AudioError::InvalidFrame("channel count must be > 0".to_string()));
        }
        if data.len() % num_channels as usize != 0 {
            return Err(AudioError::InvalidFrame(format!(
                "{} samples do not divide into {} channels",
                data.len(),
                num_channels
            )));
        }
        let samples_per_channel = (data.len() / num_channels as usize) as u32;
        Ok(Self {
            data,
            sample_rate,
            num_channels,
            samples_per_channel,
        })
    }

    /// Build a mono frame from normalized f32 samples.
    pub fn from_mono_f32(samples: &[f32], sample_rate: u32) -> Result<Self> {
        Self::new(samples.iter().copied().map(f32_to_i16).collect(), sample_rate, 1)
    }

    /// A mono frame of digital silence.
    pub fn silence(duration_ms: u32, sample_rate: u32) -> Result<Self> {
        let len = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
        Self::new(vec![0; len], sample_rate, 1)
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples_per_channel as u64 * 1000) / self.sample_rate as u64
    }

    /// Little-endian PCM16 bytes, the layout Smart Turn analyzers consume.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * 2);
        for s in &self.data {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    /// Downmix to mono and normalize to [-1.0, 1.0].
    pub fn to_mono_f32(&self) -> Vec<f32> {
        let samples: Vec<f32> = self.data.iter().copied().map(i16_to_f32).collect();
        to_mono(&samples, self.num_channels as usize)
    }
}

#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Convert PCM16 LE bytes to f32 samples. A trailing odd byte is ignored.
pub fn pcm16_to_f32(audio: &[u8]) -> Vec<f32> {
    audio
        .chunks_exact(2)
        .map(|b| i16_to_f32(i16::from_le_bytes([b[0], b[1]])))
        .collect()
}

/// Average interleaved channels into a single channel.
pub fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let inv_channels = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * inv_channels)
        .collect()
}
