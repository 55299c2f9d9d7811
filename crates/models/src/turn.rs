use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::download::download_file;
use crate::{models_dir, ModelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurnModel {
    /// Smart Turn v3.0 (8MB int8), the analyzer's bundled default
    #[default]
    SmartTurnV3,
    /// Smart Turn v3.1 CPU build
    SmartTurnV31Cpu,
}

impl TurnModel {
    pub fn all() -> &'static [TurnModel] {
        &[Self::SmartTurnV3, Self::SmartTurnV31Cpu]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SmartTurnV3 => "smart-turn-v3.0",
            Self::SmartTurnV31Cpu => "smart-turn-v3.1-cpu",
        }
    }

    pub fn dir_name(&self) -> &'static str {
        self.name()
    }

    pub fn huggingface_repo(&self) -> &'static str {
        "pipecat-ai/smart-turn-v3"
    }

    pub fn remote_path(&self) -> &'static str {
        match self {
            Self::SmartTurnV3 => "smart-turn-v3.0.onnx",
            Self::SmartTurnV31Cpu => "smart-turn-v3.1-cpu.onnx",
        }
    }

    pub fn local_filename(&self) -> &'static str {
        self.remote_path()
    }

    pub fn size_bytes(&self) -> u64 {
        match self {
            Self::SmartTurnV3 => 8_700_000,
            Self::SmartTurnV31Cpu => 9_000_000,
        }
    }

    pub fn url(&self) -> String {
        format!(
            "https://huggingface.co/{}/resolve/main/{}",
            self.huggingface_repo(),
            self.remote_path()
        )
    }

    /// Model file location under an arbitrary models root.
    pub fn file_in(&self, root: &Path) -> PathBuf {
        root.join("turn").join(self.dir_name()).join(self.local_filename())
    }
}

impl FromStr for TurnModel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| ModelError::NotFound(format!("unknown turn model: {s}")))
    }
}

pub fn turn_model_path(model: TurnModel) -> PathBuf {
    model.file_in(&models_dir())
}

/// Where the default model lives when no explicit path is configured.
pub fn default_model_path() -> PathBuf {
    turn_model_path(TurnModel::default())
}

pub fn is_turn_model_downloaded(model: TurnModel) -> bool {
    turn_model_path(model).exists()
}

pub async fn download_turn_model<F>(model: TurnModel, on_progress: F) -> Result<PathBuf>
where
    F: Fn(u64, u64),
{
    download_turn_model_to(&models_dir(), model, on_progress).await
}

/// Fetch `model` under `root` unless it is already there. Returns the file path.
pub async fn download_turn_model_to<F>(root: &Path, model: TurnModel, on_progress: F) -> Result<PathBuf>
where
    F: Fn(u64, u64),
{
    let dest = model.file_in(root);
    if dest.exists() {
        tracing::debug!(model = model.name(), "Turn model already present");
        return Ok(dest);
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let url = model.url();
    tracing::info!("Downloading {} to {:?}", url, dest);

    let total = model.size_bytes();
    let mut downloaded = 0u64;
    download_file(&url, &dest, |chunk| {
        downloaded = downloaded.saturating_add(chunk);
        on_progress(downloaded, total.max(downloaded));
    })
    .await?;

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_v3() {
        assert_eq!(TurnModel::default(), TurnModel::SmartTurnV3);
    }

    #[test]
    fn test_parse_round_trips_names() {
        for model in TurnModel::all() {
            assert_eq!(model.name().parse::<TurnModel>().unwrap(), *model);
        }
        assert!("smart-turn-v9".parse::<TurnModel>().is_err());
    }

    #[test]
    fn test_url_points_at_hub() {
        assert_eq!(
            TurnModel::SmartTurnV31Cpu.url(),
            "https://huggingface.co/pipecat-ai/smart-turn-v3/resolve/main/smart-turn-v3.1-cpu.onnx"
        );
    }

    #[test]
    fn test_file_layout() {
        let path = TurnModel::SmartTurnV3.file_in(Path::new("/models"));
        assert_eq!(
            path,
            PathBuf::from("/models/turn/smart-turn-v3.0/smart-turn-v3.0.onnx")
        );
    }

    #[tokio::test]
    async fn test_existing_model_skips_download() {
        let root = tempfile::tempdir().unwrap();
        let dest = TurnModel::SmartTurnV3.file_in(root.path());
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"onnx").unwrap();

        let calls = std::cell::Cell::new(0);
        let path = download_turn_model_to(root.path(), TurnModel::SmartTurnV3, |_, _| {
            calls.set(calls.get() + 1)
        })
        .await
        .unwrap();

        assert_eq!(path, dest);
        assert_eq!(calls.get(), 0);
    }
}
