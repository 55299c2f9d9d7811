//! Pipecat's Smart Turn v3 model as a turn detection strategy.
//!
//! The detector scores the user's buffered speech audio rather than the
//! transcript, so the session feeds it frames while the user is talking:
//!
//! ```no_run
//! use std::sync::Arc;
//! use turnkit_agents::AgentSession;
//! use turnkit_pipecat::{DetectorConfig, PipecatSmartTurnDetector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! turnkit_pipecat::register();
//! let detector = PipecatSmartTurnDetector::new(DetectorConfig::default())?;
//! let session = AgentSession::builder()
//!     .turn_detection(Arc::new(detector))
//!     .build()?;
//! # drop(session);
//! # Ok(())
//! # }
//! ```

mod config;
mod detector;
mod plugin;

pub use config::DetectorConfig;
pub use detector::{
    PipecatSmartTurnDetector, COMPLETE_PROBABILITY, ERROR_PROBABILITY, INCOMPLETE_PROBABILITY,
};
pub use plugin::{register, PipecatSmartTurnPlugin};

use turnkit_smart_turn::SmartTurnError;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("invalid detector config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    SmartTurn(#[from] SmartTurnError),
}

pub type Result<T> = std::result::Result<T, PluginError>;
