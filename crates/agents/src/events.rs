use serde::{Deserialize, Serialize};

/// Everything an `AgentSession` reports to its subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    UserStartedSpeaking {
        at_ms: u64,
    },
    UserStoppedSpeaking {
        at_ms: u64,
    },
    EndOfTurnPrediction {
        probability: f32,
        unlikely_threshold: Option<f32>,
        endpointing_delay_ms: u64,
    },
    UserTurnCommitted {
        end_ms: u64,
    },
}
