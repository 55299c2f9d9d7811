//! Drives VAD and turn detection over incoming audio frames.
//!
//! Deadlines are measured on the audio clock (the summed duration of pushed
//! frames), so a session replays identically from a file or a live stream.
//! VAD timestamps count from the detector's last reset and are rebased onto
//! that clock, so the endpointing delay runs from when speech actually ended
//! rather than from when the VAD got around to reporting it.

use std::sync::Arc;

use tokio::sync::broadcast;
use turnkit_audio::{AudioFrame, SincResampler};
use turnkit_vad::{SileroVad, VadEvent, VoiceActivityDetector};

use crate::{ChatContext, EndOfTurnDetector, Result, SessionError, SessionEvent, SessionOptions};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
struct PendingCommit {
    deadline_ms: f64,
    speech_end_ms: u64,
}

pub struct AgentSession {
    vad: Box<dyn VoiceActivityDetector>,
    turn_detection: Option<Arc<dyn EndOfTurnDetector>>,
    options: SessionOptions,
    chat_ctx: ChatContext,
    events: broadcast::Sender<SessionEvent>,
    resampler: Option<SincResampler>,
    elapsed_ms: f64,
    /// Session time at which the VAD clock reads zero.
    vad_origin_ms: u64,
    speaking: bool,
    pending: Option<PendingCommit>,
}

#[derive(Default)]
pub struct AgentSessionBuilder {
    vad: Option<Box<dyn VoiceActivityDetector>>,
    turn_detection: Option<Arc<dyn EndOfTurnDetector>>,
    options: SessionOptions,
}

impl AgentSessionBuilder {
    pub fn vad(mut self, vad: impl VoiceActivityDetector + 'static) -> Self {
        self.vad = Some(Box::new(vad));
        self
    }

    pub fn boxed_vad(mut self, vad: Box<dyn VoiceActivityDetector>) -> Self {
        self.vad = Some(vad);
        self
    }

    pub fn turn_detection(mut self, detector: Arc<dyn EndOfTurnDetector>) -> Self {
        self.turn_detection = Some(detector);
        self
    }

    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Without an explicit VAD, a Silero VAD is built from
    /// `options.vad_sample_rate` and `options.vad`.
    pub fn build(self) -> Result<AgentSession> {
        self.options.validate()?;
        let vad = match self.vad {
            Some(vad) => {
                if vad.sample_rate() != self.options.vad_sample_rate {
                    tracing::debug!(
                        vad_rate = vad.sample_rate(),
                        configured = self.options.vad_sample_rate,
                        "Supplied VAD overrides configured VAD settings"
                    );
                }
                vad
            }
            None => Box::new(SileroVad::with_settings(
                self.options.vad_sample_rate,
                self.options.vad,
            )?),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        if let Some(d) = &self.turn_detection {
            tracing::info!(
                model = d.model(),
                provider = d.provider(),
                audio = d.is_audio_turn_detector(),
                "Session using turn detector"
            );
        }

        Ok(AgentSession {
            vad,
            turn_detection: self.turn_detection,
            options: self.options,
            chat_ctx: ChatContext::new(),
            events,
            resampler: None,
            elapsed_ms: 0.0,
            vad_origin_ms: 0,
            speaking: false,
            pending: None,
        })
    }
}

impl AgentSession {
    pub fn builder() -> AgentSessionBuilder {
        AgentSessionBuilder::default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn chat_ctx(&self) -> &ChatContext {
        &self.chat_ctx
    }

    pub fn chat_ctx_mut(&mut self) -> &mut ChatContext {
        &mut self.chat_ctx
    }

    pub fn is_user_speaking(&self) -> bool {
        self.speaking
    }

    pub fn has_pending_turn(&self) -> bool {
        self.pending.is_some()
    }

    /// Audio time consumed so far.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms as u64
    }

    /// Rate the session's VAD consumes audio at.
    pub fn vad_sample_rate(&self) -> u32 {
        self.vad.sample_rate()
    }

    pub async fn push_audio(&mut self, frame: &AudioFrame) -> Result<()> {
        let samples = self.vad_input(frame)?;
        let vad_events = self.vad.detect(&samples)?;

        let starts_speech = vad_events
            .iter()
            .any(|e| matches!(e, VadEvent::SpeechStart { .. }));
        if self.speaking || starts_speech {
            if let Some(d) = self.audio_detector() {
                d.append_audio(frame);
            }
        }

        self.elapsed_ms += frame.samples_per_channel as f64 * 1000.0 / frame.sample_rate as f64;

        for event in vad_events {
            match event {
                VadEvent::SpeechStart { timestamp_ms } => {
                    self.on_speech_start(self.vad_origin_ms + timestamp_ms)
                }
                VadEvent::SpeechEnd { end_ms, .. } => {
                    self.on_speech_end(self.vad_origin_ms + end_ms).await
                }
            }
        }

        if let Some(pending) = self.pending {
            if !self.speaking && self.elapsed_ms >= pending.deadline_ms {
                self.commit(pending.speech_end_ms);
            }
        }
        Ok(())
    }

    /// Commit a turn still waiting on its endpointing delay.
    pub fn flush(&mut self) {
        if let Some(pending) = self.pending {
            self.commit(pending.speech_end_ms);
        }
    }

    pub fn reset(&mut self) {
        self.vad.reset();
        if let Some(d) = &self.turn_detection {
            d.clear_buffer();
        }
        if let Some(r) = self.resampler.as_mut() {
            r.reset();
        }
        self.vad_origin_ms = self.elapsed_ms();
        self.speaking = false;
        self.pending = None;
    }

    fn audio_detector(&self) -> Option<&Arc<dyn EndOfTurnDetector>> {
        self.turn_detection
            .as_ref()
            .filter(|d| d.is_audio_turn_detector())
    }

    fn vad_input(&mut self, frame: &AudioFrame) -> Result<Vec<f32>> {
        let mono = frame.to_mono_f32();
        let target = self.vad.sample_rate();
        if frame.sample_rate == target {
            return Ok(mono);
        }

        let stale = self
            .resampler
            .as_ref()
            .map_or(true, |r| r.from_rate() != frame.sample_rate);
        if stale {
            tracing::debug!(from = frame.sample_rate, to = target, "VAD input resampler");
            self.resampler = Some(SincResampler::new(frame.sample_rate, target)?);
        }
        Ok(self
            .resampler
            .as_mut()
            .map(|r| r.process(&mono))
            .unwrap_or_default())
    }

    fn on_speech_start(&mut self, at_ms: u64) {
        self.speaking = true;
        if self.pending.take().is_some() {
            tracing::debug!(at_ms, "User resumed speaking, pending turn cancelled");
        }
        self.emit(SessionEvent::UserStartedSpeaking { at_ms });
    }

    async fn on_speech_end(&mut self, at_ms: u64) {
        self.speaking = false;
        self.emit(SessionEvent::UserStoppedSpeaking { at_ms });

        // Silence the VAD needed to confirm the end already counts.
        let delay_ms = self.endpointing_delay_ms().await;
        self.pending = Some(PendingCommit {
            deadline_ms: (at_ms + delay_ms) as f64,
            speech_end_ms: at_ms,
        });
    }

    async fn endpointing_delay_ms(&self) -> u64 {
        let min = self.options.min_delay_ms();
        let Some(detector) = self.turn_detection.clone() else {
            return min;
        };

        let language = self.options.language.as_deref();
        if !detector.supports_language(language).await {
            tracing::debug!(?language, "Turn detector does not support language");
            return min;
        }

        let probability = detector
            .predict_end_of_turn(&self.chat_ctx, self.options.prediction_timeout())
            .await;
        let threshold = detector.unlikely_threshold(language).await;

        let delay_ms = match threshold {
            Some(t) if probability < t => self.options.max_delay_ms(),
            _ => min,
        };

        tracing::debug!(
            probability,
            ?threshold,
            delay_ms,
            "End of turn prediction"
        );
        self.emit(SessionEvent::EndOfTurnPrediction {
            probability,
            unlikely_threshold: threshold,
            endpointing_delay_ms: delay_ms,
        });
        delay_ms
    }

    fn commit(&mut self, end_ms: u64) {
        self.pending = None;
        if let Some(d) = &self.turn_detection {
            d.clear_buffer();
        }
        tracing::debug!(end_ms, "User turn committed");
        self.emit(SessionEvent::UserTurnCommitted { end_ms });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("options", &self.options)
            .field("elapsed_ms", &self.elapsed_ms)
            .field("vad_origin_ms", &self.vad_origin_ms)
            .field("speaking", &self.speaking)
            .field("pending", &self.pending)
            .finish()
    }
}
