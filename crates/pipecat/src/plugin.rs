use std::sync::Arc;

use turnkit_agents::{register_plugin, Plugin};

/// Registry entry announcing this package to the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipecatSmartTurnPlugin;

impl Plugin for PipecatSmartTurnPlugin {
    fn title(&self) -> &str {
        "turnkit_pipecat"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn package(&self) -> &str {
        env!("CARGO_PKG_NAME")
    }
}

/// Add the plugin to the process-wide registry. Later calls are no-ops.
pub fn register() -> bool {
    register_plugin(Arc::new(PipecatSmartTurnPlugin))
}
