//! The Smart Turn detector driving endpointing inside an `AgentSession`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use turnkit_agents::{AgentSession, AudioFrame, SessionEvent, SessionOptions};
use turnkit_pipecat::{DetectorConfig, PipecatSmartTurnDetector};
use turnkit_turn::TurnDetector;
use turnkit_vad::{VadEvent, VoiceActivityDetector};

/// Reports speech between two frame indices.
struct SegmentVad {
    frame: usize,
    start: usize,
    end: usize,
}

impl VoiceActivityDetector for SegmentVad {
    fn sample_rate(&self) -> u32 {
        16000
    }

    fn detect(&mut self, _audio: &[f32]) -> turnkit_vad::Result<Vec<VadEvent>> {
        let idx = self.frame;
        self.frame += 1;
        Ok(if idx == self.start {
            vec![VadEvent::SpeechStart {
                timestamp_ms: idx as u64 * 20,
            }]
        } else if idx == self.end {
            vec![VadEvent::SpeechEnd {
                start_ms: self.start as u64 * 20,
                end_ms: idx as u64 * 20,
            }]
        } else {
            Vec::new()
        })
    }

    fn reset(&mut self) {
        self.frame = 0;
    }
}

/// Returns queued probabilities and records how much audio each call saw.
#[derive(Default)]
struct QueuedModel {
    outputs: Mutex<VecDeque<f32>>,
    seen: Mutex<Vec<usize>>,
}

impl TurnDetector for QueuedModel {
    fn name(&self) -> &'static str {
        "queued"
    }

    fn predict_endpoint_probability(&self, audio: &[f32]) -> turnkit_turn::Result<f32> {
        self.seen.lock().unwrap().push(audio.len());
        Ok(self.outputs.lock().unwrap().pop_front().unwrap_or(0.0))
    }
}

fn session_with(model: Arc<QueuedModel>, options: SessionOptions) -> AgentSession {
    let detector =
        PipecatSmartTurnDetector::with_model(DetectorConfig::default(), model).unwrap();
    AgentSession::builder()
        .vad(SegmentVad {
            frame: 0,
            start: 5,
            end: 30,
        })
        .turn_detection(Arc::new(detector))
        .options(options)
        .build()
        .unwrap()
}

fn speech_frame() -> AudioFrame {
    AudioFrame::new(vec![2000; 320], 16000, 1).unwrap()
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn prediction(events: &[SessionEvent]) -> Option<(f32, u64)> {
    events.iter().find_map(|e| match e {
        SessionEvent::EndOfTurnPrediction {
            probability,
            endpointing_delay_ms,
            ..
        } => Some((*probability, *endpointing_delay_ms)),
        _ => None,
    })
}

#[tokio::test]
async fn confident_prediction_commits_quickly() {
    let model = Arc::new(QueuedModel::default());
    model.outputs.lock().unwrap().push_back(0.92);
    let mut session = session_with(model.clone(), SessionOptions::default());
    let mut rx = session.subscribe();

    for _ in 0..31 {
        session.push_audio(&speech_frame()).await.unwrap();
    }
    let events = drain(&mut rx);
    let (probability, delay) = prediction(&events).unwrap();
    assert!((probability - 0.92).abs() < 1e-6);
    assert_eq!(delay, 500);

    // frames 5..=30 were speech: 26 frames of 320 samples
    assert_eq!(*model.seen.lock().unwrap(), vec![26 * 320]);

    for _ in 0..25 {
        session.push_audio(&speech_frame()).await.unwrap();
    }
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, SessionEvent::UserTurnCommitted { end_ms: 600 })));
}

#[tokio::test]
async fn hesitant_prediction_waits_longer() {
    let model = Arc::new(QueuedModel::default());
    model.outputs.lock().unwrap().push_back(0.2);
    let options = SessionOptions {
        max_endpointing_delay: 2.0,
        ..SessionOptions::default()
    };
    let mut session = session_with(model, options);
    let mut rx = session.subscribe();

    for _ in 0..31 {
        session.push_audio(&speech_frame()).await.unwrap();
    }
    let (_, delay) = prediction(&drain(&mut rx)).unwrap();
    assert_eq!(delay, 2000);
    assert!(session.has_pending_turn());
}
