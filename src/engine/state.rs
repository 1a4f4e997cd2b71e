use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Pipeline lifecycle states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Initializing,
    Running {
        #[serde(skip)]
        start_time: Option<Instant>,
    },
    Stopping,
    Stopped {
        records_consumed: u64,
    },
    Failed {
        cause: String,
    },
}

impl PipelineState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &PipelineState) -> bool {
        use PipelineState::*;

        matches!(
            (self, target),
            (Idle, Initializing)
                | (Initializing, Running { .. })
                | (Initializing, Failed { .. })
                | (Running { .. }, Stopping)
                | (Running { .. }, Failed { .. })
                | (Stopping, Stopped { .. })
                | (Stopping, Failed { .. })
                | (Stopped { .. }, Idle)
                | (Failed { .. }, Idle)
        )
    }

    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Initializing => "Initializing",
            Self::Running { .. } => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped { .. } => "Stopped",
            Self::Failed { .. } => "Failed",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Idle
    }
}
