use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use turnkit_agents::{AudioFrame, ChatContext, EndOfTurnDetector};
use turnkit_audio::resample_linear;
use turnkit_smart_turn::{
    SmartTurnAnalyzer, SmartTurnMetrics, SmartTurnModel, SmartTurnParams,
};
use turnkit_turn::{EndOfTurnState, TurnDetector};

use crate::{DetectorConfig, Result};

/// Reported when the analyzer decides Complete without producing metrics.
pub const COMPLETE_PROBABILITY: f32 = 0.9;
/// Reported when the analyzer decides Incomplete without producing metrics.
pub const INCOMPLETE_PROBABILITY: f32 = 0.1;
/// Reported when analysis fails or times out.
pub const ERROR_PROBABILITY: f32 = 0.5;

/// End-of-turn detector backed by a local Smart Turn v3 analyzer.
///
/// Every appended frame is treated as speech: the session only forwards
/// audio while the user is talking.
///
/// `append_audio` and `clear_buffer` never wait on a running inference,
/// including one abandoned after a timeout. While the analyzer is busy
/// their work is queued and replayed once it is free.
pub struct PipecatSmartTurnDetector {
    config: DetectorConfig,
    shared: Arc<Shared>,
}

struct Shared {
    analyzer: Mutex<SmartTurnAnalyzer>,
    backlog: Mutex<Backlog>,
}

/// Work deferred while the analyzer was locked, in arrival order after `clear`.
#[derive(Default)]
struct Backlog {
    clear: bool,
    frames: Vec<Vec<f32>>,
}

impl Shared {
    /// Blocking access with any deferred work applied first.
    fn analyzer(&self) -> MutexGuard<'_, SmartTurnAnalyzer> {
        let mut analyzer = lock(&self.analyzer);
        self.replay(&mut analyzer);
        analyzer
    }

    /// Access only if no inference holds the analyzer.
    fn try_analyzer(&self) -> Option<MutexGuard<'_, SmartTurnAnalyzer>> {
        let mut analyzer = match self.analyzer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        self.replay(&mut analyzer);
        Some(analyzer)
    }

    fn replay(&self, analyzer: &mut SmartTurnAnalyzer) {
        let backlog = std::mem::take(&mut *lock(&self.backlog));
        if backlog.clear {
            analyzer.clear();
        }
        for samples in &backlog.frames {
            analyzer.append_samples(samples, true);
        }
    }

    fn defer(&self, update: impl FnOnce(&mut Backlog)) {
        update(&mut lock(&self.backlog));
    }
}

impl PipecatSmartTurnDetector {
    /// Load the configured model, or the default one when no path is set.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let path = config.resolved_model_path();
        tracing::info!(path = %path.display(), "Loading Smart Turn model");
        let model = SmartTurnModel::load(&path)?;
        Self::with_model(config, Arc::new(model))
    }

    /// Use an already constructed model.
    pub fn with_model(config: DetectorConfig, model: Arc<dyn TurnDetector>) -> Result<Self> {
        config.validate()?;
        let analyzer =
            SmartTurnAnalyzer::new(model, config.sample_rate, SmartTurnParams::default())?;
        Ok(Self {
            config,
            shared: Arc::new(Shared {
                analyzer: Mutex::new(analyzer),
                backlog: Mutex::new(Backlog::default()),
            }),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Speech currently waiting to be scored.
    pub fn buffered_ms(&self) -> u64 {
        self.shared.analyzer().buffered_ms()
    }

    /// Mono samples at the configured rate.
    fn speech_samples(&self, frame: &AudioFrame) -> Vec<f32> {
        let samples = frame.to_mono_f32();
        if frame.sample_rate == self.config.sample_rate {
            return samples;
        }
        tracing::trace!(
            frame_rate = frame.sample_rate,
            expected = self.config.sample_rate,
            "Resampling frame for Smart Turn"
        );
        resample_linear(&samples, frame.sample_rate, self.config.sample_rate)
    }

    async fn analyze(&self, timeout: Option<Duration>) -> f32 {
        let shared = self.shared.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mut analyzer = shared.analyzer();
            analyzer.analyze_end_of_turn()
        });

        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = limit.as_millis() as u64,
                        "Smart Turn prediction timed out"
                    );
                    return ERROR_PROBABILITY;
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok((state, metrics))) => probability_from(state, metrics),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Error in Smart Turn prediction");
                ERROR_PROBABILITY
            }
            Err(e) => {
                tracing::error!(error = %e, "Smart Turn prediction task failed");
                ERROR_PROBABILITY
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn probability_from(state: EndOfTurnState, metrics: Option<SmartTurnMetrics>) -> f32 {
    match (metrics, state) {
        (Some(m), _) => m.probability,
        (None, EndOfTurnState::Complete) => COMPLETE_PROBABILITY,
        (None, EndOfTurnState::Incomplete) => INCOMPLETE_PROBABILITY,
    }
}

#[async_trait]
impl EndOfTurnDetector for PipecatSmartTurnDetector {
    fn model(&self) -> &str {
        "pipecat-smart-turn-v3"
    }

    fn provider(&self) -> &str {
        "pipecat"
    }

    fn is_audio_turn_detector(&self) -> bool {
        true
    }

    fn append_audio(&self, frame: &AudioFrame) {
        let samples = self.speech_samples(frame);
        match self.shared.try_analyzer() {
            Some(mut analyzer) => {
                analyzer.append_samples(&samples, true);
            }
            None => {
                tracing::trace!("Smart Turn busy, queueing frame");
                self.shared.defer(|backlog| backlog.frames.push(samples));
            }
        }
    }

    fn clear_buffer(&self) {
        match self.shared.try_analyzer() {
            Some(mut analyzer) => analyzer.clear(),
            None => {
                tracing::debug!("Smart Turn busy, clearing once inference finishes");
                self.shared.defer(|backlog| {
                    backlog.clear = true;
                    backlog.frames.clear();
                });
            }
        }
    }

    async fn unlikely_threshold(&self, _language: Option<&str>) -> Option<f32> {
        Some(self.config.unlikely_threshold)
    }

    async fn supports_language(&self, _language: Option<&str>) -> bool {
        true
    }

    /// Scores the audio appended since the last analysis; the chat context
    /// plays no part.
    async fn predict_end_of_turn(&self, _chat_ctx: &ChatContext, timeout: Option<Duration>) -> f32 {
        tracing::debug!("Starting Smart Turn prediction");
        let started = Instant::now();
        let probability = self.analyze(timeout).await;
        tracing::debug!(
            probability,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Smart Turn prediction result"
        );
        probability
    }
}

impl std::fmt::Debug for PipecatSmartTurnDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipecatSmartTurnDetector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnkit_turn::TurnError;

    enum Behaviour {
        Probability(f32),
        Fail,
        Slow(Duration, f32),
    }

    struct FakeModel(Behaviour);

    impl TurnDetector for FakeModel {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn predict_endpoint_probability(&self, _audio: &[f32]) -> turnkit_turn::Result<f32> {
            match self.0 {
                Behaviour::Probability(p) => Ok(p),
                Behaviour::Fail => Err(TurnError::Inference("boom".to_string())),
                Behaviour::Slow(delay, p) => {
                    std::thread::sleep(delay);
                    Ok(p)
                }
            }
        }
    }

    fn detector(behaviour: Behaviour) -> PipecatSmartTurnDetector {
        PipecatSmartTurnDetector::with_model(DetectorConfig::default(), Arc::new(FakeModel(behaviour)))
            .unwrap()
    }

    fn speech_frame(rate: u32, channels: u32) -> AudioFrame {
        let per_channel = rate as usize / 50;
        AudioFrame::new(vec![1000; per_channel * channels as usize], rate, channels).unwrap()
    }

    #[test]
    fn test_protocol_metadata() {
        let d = detector(Behaviour::Probability(0.7));
        assert_eq!(d.model(), "pipecat-smart-turn-v3");
        assert_eq!(d.provider(), "pipecat");
        assert!(d.is_audio_turn_detector());
    }

    #[tokio::test]
    async fn test_threshold_and_languages() {
        let config = DetectorConfig::default().with_unlikely_threshold(0.3);
        let d = PipecatSmartTurnDetector::with_model(config, Arc::new(FakeModel(Behaviour::Fail)))
            .unwrap();
        assert_eq!(d.unlikely_threshold(None).await, Some(0.3));
        assert_eq!(d.unlikely_threshold(Some("ja")).await, Some(0.3));
        assert!(d.supports_language(Some("fr")).await);
        assert!(d.supports_language(None).await);
    }

    #[tokio::test]
    async fn test_probability_comes_from_model() {
        let d = detector(Behaviour::Probability(0.83));
        for _ in 0..10 {
            d.append_audio(&speech_frame(16000, 1));
        }
        let p = d.predict_end_of_turn(&ChatContext::new(), None).await;
        assert!((p - 0.83).abs() < 1e-6);
        assert_eq!(d.buffered_ms(), 0);
    }

    #[tokio::test]
    async fn test_empty_buffer_reports_incomplete() {
        let d = detector(Behaviour::Probability(0.99));
        let p = d.predict_end_of_turn(&ChatContext::new(), None).await;
        assert_eq!(p, INCOMPLETE_PROBABILITY);
    }

    #[tokio::test]
    async fn test_clear_buffer_drops_audio() {
        let d = detector(Behaviour::Probability(0.99));
        d.append_audio(&speech_frame(16000, 1));
        assert!(d.buffered_ms() > 0);
        d.clear_buffer();
        assert_eq!(d.buffered_ms(), 0);
        let p = d.predict_end_of_turn(&ChatContext::new(), None).await;
        assert_eq!(p, INCOMPLETE_PROBABILITY);
    }

    #[tokio::test]
    async fn test_model_error_returns_neutral() {
        let d = detector(Behaviour::Fail);
        d.append_audio(&speech_frame(16000, 1));
        let p = d.predict_end_of_turn(&ChatContext::new(), None).await;
        assert_eq!(p, ERROR_PROBABILITY);
    }

    #[tokio::test]
    async fn test_timeout_returns_neutral() {
        let d = detector(Behaviour::Slow(Duration::from_millis(300), 0.9));
        d.append_audio(&speech_frame(16000, 1));
        let p = d
            .predict_end_of_turn(&ChatContext::new(), Some(Duration::from_millis(10)))
            .await;
        assert_eq!(p, ERROR_PROBABILITY);
    }

    #[tokio::test]
    async fn test_append_does_not_wait_for_abandoned_inference() {
        let d = detector(Behaviour::Slow(Duration::from_millis(300), 0.9));
        d.append_audio(&speech_frame(16000, 1));
        let p = d
            .predict_end_of_turn(&ChatContext::new(), Some(Duration::from_millis(50)))
            .await;
        assert_eq!(p, ERROR_PROBABILITY);

        let started = Instant::now();
        for _ in 0..5 {
            d.append_audio(&speech_frame(16000, 1));
        }
        assert!(started.elapsed() < Duration::from_millis(150));

        // queued frames land after the late analysis cleared the buffer
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(d.buffered_ms(), 100);
    }

    #[tokio::test]
    async fn test_clear_during_inference_is_deferred() {
        let d = detector(Behaviour::Slow(Duration::from_millis(300), 0.2));
        d.append_audio(&speech_frame(16000, 1));
        d.predict_end_of_turn(&ChatContext::new(), Some(Duration::from_millis(50)))
            .await;

        let started = Instant::now();
        for _ in 0..3 {
            d.append_audio(&speech_frame(16000, 1));
        }
        d.clear_buffer();
        d.append_audio(&speech_frame(16000, 1));
        d.append_audio(&speech_frame(16000, 1));
        assert!(started.elapsed() < Duration::from_millis(150));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(d.buffered_ms(), 40);
    }

    #[test]
    fn test_stereo_high_rate_frames_are_converted() {
        let d = detector(Behaviour::Probability(0.5));
        for _ in 0..10 {
            d.append_audio(&speech_frame(48000, 2));
        }
        assert_eq!(d.buffered_ms(), 200);
    }

    #[test]
    fn test_fallback_probabilities() {
        assert_eq!(probability_from(EndOfTurnState::Complete, None), COMPLETE_PROBABILITY);
        assert_eq!(probability_from(EndOfTurnState::Incomplete, None), INCOMPLETE_PROBABILITY);
        let metrics = SmartTurnMetrics {
            is_complete: false,
            probability: 0.42,
            inference_time_ms: 1.0,
            e2e_processing_time_ms: 2.0,
        };
        assert_eq!(probability_from(EndOfTurnState::Complete, Some(metrics)), 0.42);
    }

    #[test]
    fn test_missing_model_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = DetectorConfig::default().with_model_path(dir.path().join("absent.onnx"));
        let err = PipecatSmartTurnDetector::new(config).unwrap_err();
        assert!(matches!(
            err,
            crate::PluginError::SmartTurn(turnkit_smart_turn::SmartTurnError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_config_fails_before_loading() {
        let config = DetectorConfig::default().with_sample_rate(0);
        assert!(matches!(
            PipecatSmartTurnDetector::new(config),
            Err(crate::PluginError::InvalidConfig(_))
        ));
    }
}
