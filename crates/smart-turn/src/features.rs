//! Whisper-style log-mel features for Smart Turn.
//!
//! The model was trained on Whisper's feature extractor output, so every step
//! below has to match it: 8 s window anchored at the end of the audio,
//! per-utterance normalization, reflect-padded STFT, Slaney mel bank, log10
//! with a dynamic range floor.

use std::sync::{Arc, OnceLock};

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub const SAMPLE_RATE: usize = 16_000;
pub const MAX_SECONDS: usize = 8;
/// Samples in the model's input window (8 s at 16 kHz).
pub const WINDOW_SAMPLES: usize = SAMPLE_RATE * MAX_SECONDS;

const N_FFT: usize = 400;
const HOP: usize = 160;
const N_FREQ: usize = N_FFT / 2 + 1;
pub const N_MELS: usize = 80;
const STFT_FRAMES: usize = 1 + WINDOW_SAMPLES / HOP;
pub const N_FRAMES: usize = STFT_FRAMES - 1;

/// Tensor shape fed to the model, without the batch dimension.
pub const FEATURE_SHAPE: (usize, usize) = (N_MELS, N_FRAMES);

const MEL_FMAX: f64 = 8000.0;
const LOG_FLOOR: f32 = 8.0;

/// Precomputed window, filterbank and FFT plan.
pub struct FeatureExtractor {
    window: Vec<f64>,
    /// Row-major `[mel][freq]`.
    mel_bank: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

static SHARED: OnceLock<FeatureExtractor> = OnceLock::new();

impl FeatureExtractor {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            window: periodic_hann(N_FFT),
            mel_bank: slaney_mel_bank(N_FREQ, N_MELS, SAMPLE_RATE, 0.0, MEL_FMAX),
            fft: planner.plan_fft_forward(N_FFT),
        }
    }

    /// Process-wide instance; the tables are immutable once built.
    pub fn shared() -> &'static FeatureExtractor {
        SHARED.get_or_init(FeatureExtractor::new)
    }

    /// Compute `[N_MELS * N_FRAMES]` features (mel-major) from 16 kHz mono audio.
    pub fn extract(&self, audio_16k_mono: &[f32]) -> Vec<f32> {
        let mut audio = fit_to_window(audio_16k_mono, WINDOW_SAMPLES);
        normalize(&mut audio);
        let padded = reflect_pad(&audio, N_FFT / 2);

        let mut features = vec![0.0f32; N_MELS * N_FRAMES];
        let mut buf = vec![Complex::new(0.0f64, 0.0); N_FFT];
        let mut power = vec![0.0f64; N_FREQ];

        // The final STFT frame is dropped, as Whisper does.
        for frame in 0..N_FRAMES {
            let start = frame * HOP;
            for (dst, (x, w)) in buf
                .iter_mut()
                .zip(padded[start..start + N_FFT].iter().zip(&self.window))
            {
                *dst = Complex::new(*x as f64 * w, 0.0);
            }
            self.fft.process(&mut buf);
            for (p, c) in power.iter_mut().zip(&buf) {
                *p = c.norm_sqr();
            }

            for mel in 0..N_MELS {
                let row = &self.mel_bank[mel * N_FREQ..(mel + 1) * N_FREQ];
                let energy: f64 = row.iter().zip(&power).map(|(f, p)| f * p).sum();
                features[mel * N_FRAMES + frame] = energy.max(1e-10).log10() as f32;
            }
        }

        let peak = features.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - LOG_FLOOR;
        for v in &mut features {
            *v = ((*v).max(floor) + 4.0) / 4.0;
        }
        features
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the trailing `len` samples, left-padding with zeros when shorter.
fn fit_to_window(audio: &[f32], len: usize) -> Vec<f32> {
    if audio.len() >= len {
        return audio[audio.len() - len..].to_vec();
    }
    let mut out = vec![0.0f32; len - audio.len()];
    out.extend_from_slice(audio);
    out
}

fn normalize(x: &mut [f32]) {
    if x.is_empty() {
        return;
    }
    let n = x.len() as f64;
    let mean = x.iter().map(|v| *v as f64).sum::<f64>() / n;
    let var = x.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / n;
    let denom = (var + 1e-7).sqrt();
    for v in x.iter_mut() {
        *v = ((*v as f64 - mean) / denom) as f32;
    }
}

fn reflect_pad(x: &[f32], pad: usize) -> Vec<f32> {
    if pad == 0 {
        return x.to_vec();
    }
    // Too short to reflect: fall back to zero padding.
    if x.len() <= pad {
        let mut out = vec![0.0; pad];
        out.extend_from_slice(x);
        out.resize(out.len() + pad, 0.0);
        return out;
    }

    let mut out = Vec::with_capacity(x.len() + 2 * pad);
    out.extend(x[1..=pad].iter().rev());
    out.extend_from_slice(x);
    out.extend(x[x.len() - 1 - pad..x.len() - 1].iter().rev());
    out
}

fn periodic_hann(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos())
        .collect()
}

const SLANEY_MIN_LOG_HZ: f64 = 1000.0;
const SLANEY_MIN_LOG_MEL: f64 = 15.0;

fn hz_to_mel(freq: f64) -> f64 {
    if freq >= SLANEY_MIN_LOG_HZ {
        SLANEY_MIN_LOG_MEL + (freq / SLANEY_MIN_LOG_HZ).ln() * (27.0 / 6.4_f64.ln())
    } else {
        3.0 * freq / 200.0
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel >= SLANEY_MIN_LOG_MEL {
        SLANEY_MIN_LOG_HZ * ((6.4_f64.ln() / 27.0) * (mel - SLANEY_MIN_LOG_MEL)).exp()
    } else {
        200.0 * mel / 3.0
    }
}

/// Triangular filters with Slaney area normalization, returned `[mel][freq]`.
fn slaney_mel_bank(
    n_freq: usize,
    n_mels: usize,
    sample_rate: usize,
    fmin: f64,
    fmax: f64,
) -> Vec<f64> {
    let (mel_lo, mel_hi) = (hz_to_mel(fmin), hz_to_mel(fmax));
    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_lo + (mel_hi - mel_lo) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let nyquist = sample_rate as f64 / 2.0;
    let bin_hz: Vec<f64> = (0..n_freq)
        .map(|k| {
            if n_freq == 1 {
                0.0
            } else {
                nyquist * k as f64 / (n_freq - 1) as f64
            }
        })
        .collect();

    let mut bank = vec![0.0f64; n_mels * n_freq];
    for mel in 0..n_mels {
        let (left, center, right) = (edges[mel], edges[mel + 1], edges[mel + 2]);
        let enorm = 2.0 / (right - left);
        for (k, hz) in bin_hz.iter().enumerate() {
            let rising = (hz - left) / (center - left);
            let falling = (right - hz) / (right - center);
            bank[mel * n_freq + k] = rising.min(falling).max(0.0) * enorm;
        }
    }
    bank
}
