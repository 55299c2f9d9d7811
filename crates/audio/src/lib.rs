mod frame;
mod resample;
mod wav;

pub use frame::{f32_to_i16, i16_to_f32, pcm16_to_f32, to_mono, AudioFrame};
pub use resample::{resample_linear, SincResampler};
pub use wav::{read_wav, write_wav, WavAudio};

/// Sample rate expected by the VAD and turn models.
pub const SAMPLE_RATE: u32 = 16000;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("resampler error: {0}")]
    Resampler(String),
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("unsupported wav format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;
