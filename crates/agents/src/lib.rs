//! Host-side pieces of a voice agent: the turn detector protocol, plugin
//! registry and an `AgentSession` that turns raw audio into user turns.

mod chat;
mod events;
mod options;
pub mod plugin;
mod session;
mod turn_detector;

pub use chat::{ChatContext, ChatMessage, ChatRole};
pub use events::SessionEvent;
pub use options::SessionOptions;
pub use plugin::{register_plugin, registered_plugins, Plugin, PluginRegistry};
pub use session::{AgentSession, AgentSessionBuilder};
pub use turn_detector::EndOfTurnDetector;

pub use turnkit_audio::AudioFrame;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("failed to read options: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse options: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("vad error: {0}")]
    Vad(#[from] turnkit_vad::VadError),
    #[error("audio error: {0}")]
    Audio(#[from] turnkit_audio::AudioError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
