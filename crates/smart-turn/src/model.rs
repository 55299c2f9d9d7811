//! ONNX Runtime session for the Smart Turn v3 classifier.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use turnkit_turn::{TurnDetector, TurnError};

use crate::features::{FeatureExtractor, FEATURE_SHAPE};
use crate::SmartTurnError;

const INPUT_NAME: &str = "input_features";

/// Smart Turn v3 running on the CPU execution provider.
#[derive(Debug)]
pub struct SmartTurnModel {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    path: PathBuf,
}

impl SmartTurnModel {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, SmartTurnError> {
        let path = model_path.as_ref();
        if !path.is_file() {
            return Err(SmartTurnError::ModelNotFound(path.to_path_buf()));
        }

        let session = cpu_session(path)?;
        let (input_name, output_name) = io_names(&session)?;
        tracing::info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            "Smart Turn model ready"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Probability in [0, 1] that the audio ends a turn.
    pub fn predict_probability(&self, audio_16k_mono: &[f32]) -> Result<f32, SmartTurnError> {
        let features = FeatureExtractor::shared().extract(audio_16k_mono);
        let (mels, frames) = FEATURE_SHAPE;
        let batch = Tensor::from_array(([1i64, mels as i64, frames as i64], features))
            .map_err(|e| inference_err("feature tensor", e))?;

        let raw = self.run(batch)?;
        if !raw.is_finite() {
            return Err(SmartTurnError::Inference(format!(
                "{} produced a non-finite score",
                self.path.display()
            )));
        }
        Ok(raw.clamp(0.0, 1.0))
    }

    fn run(&self, batch: Tensor<f32>) -> Result<f32, SmartTurnError> {
        let mut session = match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => batch])
            .map_err(|e| inference_err("run", e))?;
        let Some(scores) = outputs.get(self.output_name.as_str()) else {
            return Err(SmartTurnError::Inference(format!(
                "output {:?} absent from results",
                self.output_name
            )));
        };
        let (_shape, values) = scores
            .try_extract_tensor::<f32>()
            .map_err(|e| inference_err("read scores", e))?;
        values
            .first()
            .copied()
            .ok_or_else(|| SmartTurnError::Inference("score tensor is empty".to_string()))
    }
}

/// One intra-op thread, sequential execution: the classifier is tiny and
/// shares the CPU with the VAD.
fn cpu_session(path: &Path) -> Result<Session, SmartTurnError> {
    for (key, value) in [("OMP_NUM_THREADS", "1"), ("OMP_WAIT_POLICY", "PASSIVE")] {
        if std::env::var_os(key).is_none() {
            std::env::set_var(key, value);
        }
    }

    let builder = Session::builder().map_err(|e| model_err("create builder", e))?;
    let builder = builder
        .with_parallel_execution(false)
        .map_err(|e| model_err("sequential execution", e))?;
    let builder = builder
        .with_intra_threads(1)
        .map_err(|e| model_err("intra-op threads", e))?;
    let builder = builder
        .with_inter_threads(1)
        .map_err(|e| model_err("inter-op threads", e))?;
    let mut builder = builder
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| model_err("graph optimization", e))?;
    builder
        .commit_from_file(path)
        .map_err(|e| model_err("read model", e))
}

/// Prefer the named mel input; otherwise the graph's first input.
fn io_names(session: &Session) -> Result<(String, String), SmartTurnError> {
    let input = session
        .inputs
        .iter()
        .find(|i| i.name == INPUT_NAME)
        .or_else(|| session.inputs.first())
        .map(|i| i.name.clone());
    let output = session.outputs.first().map(|o| o.name.clone());
    match (input, output) {
        (Some(i), Some(o)) => Ok((i, o)),
        (None, _) => Err(SmartTurnError::Model("graph declares no inputs".to_string())),
        (_, None) => Err(SmartTurnError::Model("graph declares no outputs".to_string())),
    }
}

fn model_err(step: &str, e: impl std::fmt::Display) -> SmartTurnError {
    SmartTurnError::Model(format!("{step}: {e}"))
}

fn inference_err(step: &str, e: impl std::fmt::Display) -> SmartTurnError {
    SmartTurnError::Inference(format!("{step}: {e}"))
}

impl TurnDetector for SmartTurnModel {
    fn name(&self) -> &'static str {
        "smart-turn-v3"
    }

    fn predict_endpoint_probability(&self, audio_16k_mono: &[f32]) -> Result<f32, TurnError> {
        self.predict_probability(audio_16k_mono)
            .map_err(|e| TurnError::Inference(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_reported_with_path() {
        let err = SmartTurnModel::load("/no/such/smart-turn.onnx").unwrap_err();
        match err {
            SmartTurnError::ModelNotFound(p) => assert!(p.ends_with("smart-turn.onnx")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_directory_is_not_a_model() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SmartTurnModel::load(dir.path()),
            Err(SmartTurnError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_step_is_named_in_errors() {
        let err = model_err("read model", "bad magic");
        assert_eq!(err.to_string(), "failed to load model: read model: bad magic");
    }

    #[test]
    fn test_garbage_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"not a model").unwrap();
        assert!(matches!(
            SmartTurnModel::load(&path),
            Err(SmartTurnError::Model(_))
        ));
    }
}
