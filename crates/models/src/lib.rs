mod download;
mod turn;

use std::ffi::OsString;
use std::path::PathBuf;

pub use download::download_file;
pub use turn::{
    default_model_path, download_turn_model, download_turn_model_to, is_turn_model_downloaded,
    turn_model_path, TurnModel,
};

/// Overrides the platform data directory for model storage.
pub const MODELS_DIR_ENV: &str = "TURNKIT_MODELS_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model not found: {0}")]
    NotFound(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;

pub fn models_dir() -> PathBuf {
    resolve_models_dir(std::env::var_os(MODELS_DIR_ENV))
}

fn resolve_models_dir(env_override: Option<OsString>) -> PathBuf {
    match env_override {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("turnkit")
            .join("models"),
    }
}
