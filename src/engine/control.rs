//! Runtime control surface.
//!
//! Commands and responses are JSON objects, one per line on the console:
//!
//! ```json
//! {"command": "queue_depth", "buffer": "split"}
//! {"command": "status"}
//! ```

use crate::observability::MetricsSnapshot;
use crate::resilience::FatalCondition;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Queue length of every buffer, or of those whose label, supplier or
    /// consumer equals `buffer`
    QueueDepth {
        #[serde(default)]
        buffer: Option<String>,
    },
    ListErrors,
    ClearErrors,
    Status,
    Metrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    /// `supplier->consumer`
    pub buffer: String,
    pub supplier: String,
    pub consumer: String,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum ControlResponse {
    QueueDepths {
        buffers: Vec<QueueDepth>,
    },
    Errors {
        errors: Vec<FatalCondition>,
    },
    Cleared {
        count: usize,
    },
    Status {
        pipeline: String,
        state: String,
        active_stages: usize,
        streams_opened: u64,
        has_error: bool,
    },
    Metrics {
        stages: Vec<MetricsSnapshot>,
    },
    Error {
        message: String,
    },
}

impl ControlResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ControlResponse::Error {
            message: message.into(),
        }
    }

    /// Render as a single JSON line.
    pub fn to_line(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"response\":\"error\",\"message\":\"{}\"}}", e))
    }
}
