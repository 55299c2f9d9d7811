//! WAV file loading and saving via hound.

use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::frame::f32_to_i16;
use crate::{AudioError, AudioFrame, Result};

/// Decoded WAV contents as interleaved PCM16.
#[derive(Debug, Clone)]
pub struct WavAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u32,
}

impl WavAudio {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        (self.samples.len() as u64 / self.channels as u64) * 1000 / self.sample_rate as u64
    }

    /// Split into frames of `frame_ms` each; the last frame may be shorter.
    pub fn frames(&self, frame_ms: u32) -> Result<Vec<AudioFrame>> {
        let per_channel = ((self.sample_rate as u64 * frame_ms as u64) / 1000).max(1) as usize;
        let chunk = per_channel * self.channels as usize;
        self.samples
            .chunks(chunk)
            .map(|c| AudioFrame::new(c.to_vec(), self.sample_rate, self.channels))
            .collect()
    }
}

pub fn read_wav(path: impl AsRef<Path>) -> Result<WavAudio> {
    let mut reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader.samples::<i16>().collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, bits @ (24 | 32)) => {
            let shift = bits - 16;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<std::result::Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(f32_to_i16))
            .collect::<std::result::Result<_, _>>()?,
        (format, bits) => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{format:?} with {bits} bits per sample"
            )))
        }
    };

    tracing::debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        "Loaded wav"
    );

    Ok(WavAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels as u32,
    })
}

pub fn write_wav(path: impl AsRef<Path>, frame: &AudioFrame) -> Result<()> {
    let spec = WavSpec {
        channels: frame.num_channels as u16,
        sample_rate: frame.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let file = std::fs::File::create(path.as_ref()).map_err(hound::Error::IoError)?;
    let mut writer = WavWriter::new(BufWriter::new(file), spec)?;
    for &sample in &frame.data {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
