//! Example: run a WAV file through a VAD + Smart Turn session and print the
//! session events as JSON lines.
//!
//! Run with: cargo run -p turnkit-pipecat --example detect_turns -- input.wav [model.onnx]
//!
//! Without a model path the default Smart Turn model is downloaded first.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use turnkit_agents::{AgentSession, SessionEvent, SessionOptions};
use turnkit_audio::read_wav;
use turnkit_models::{download_turn_model, is_turn_model_downloaded, TurnModel};
use turnkit_pipecat::{DetectorConfig, PipecatSmartTurnDetector};

const FRAME_MS: u32 = 20;

fn print_events(rx: &mut broadcast::Receiver<SessionEvent>) -> anyhow::Result<()> {
    while let Ok(event) = rx.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,turnkit_pipecat=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .context("usage: detect_turns <input.wav> [model.onnx]")?;
    let model_path = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            let model = TurnModel::default();
            if !is_turn_model_downloaded(model) {
                tracing::info!(model = model.name(), "Fetching default turn model");
            }
            download_turn_model(model, |done, total| {
                tracing::debug!(done, total, "Downloading turn model");
            })
            .await
            .context("failed to fetch the default Smart Turn model")?
        }
    };

    turnkit_pipecat::register();

    let audio = read_wav(&input).with_context(|| format!("failed to read {input}"))?;
    tracing::info!(
        sample_rate = audio.sample_rate,
        channels = audio.channels,
        duration_ms = audio.duration_ms(),
        "Loaded input"
    );

    let config = DetectorConfig::default()
        .with_model_path(model_path)
        .with_sample_rate(audio.sample_rate);
    let detector = PipecatSmartTurnDetector::new(config)?;

    // Silero VAD is built from the options' [vad] settings
    let mut session = AgentSession::builder()
        .turn_detection(Arc::new(detector))
        .options(SessionOptions::default())
        .build()?;
    let mut rx = session.subscribe();

    for frame in audio.frames(FRAME_MS)? {
        session.push_audio(&frame).await?;
        print_events(&mut rx)?;
    }
    session.flush();
    print_events(&mut rx)?;

    Ok(())
}
