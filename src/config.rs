//! Pipeline configuration.
//!
//! Loaded from a JSON file. Component sections stay as raw JSON values and are
//! decoded by the factory registered for the component's `type`.
//!
//! ```json
//! {
//!   "name": "cdr-mediation",
//!   "buffer": "linked",
//!   "stages": [
//!     {"kind": "source", "name": "switch-a", "type": "tcp", "batch_size": 200,
//!      "config": {"host": "10.0.0.5", "port": 7001}},
//!     {"kind": "transform", "name": "split", "type": "field_splitter",
//!      "config": {"delimiter": ";", "fields": ["caller", "callee", "duration"]}},
//!     {"kind": "sink", "name": "archive", "type": "file", "config": {"directory": "/var/cdr/out"}}
//!   ]
//! }
//! ```

use crate::buffers::BufferKind;
use crate::error::ConfigError;
use crate::observability::LoggingConfig;
use crate::resilience::DataFaultPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

fn default_batch_size() -> usize {
    100
}

fn default_idle_interval_ms() -> u64 {
    50
}

fn default_supervise_interval_ms() -> u64 {
    100
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

/// One stage of a linear pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageConfig {
    Source {
        name: String,
        #[serde(rename = "type")]
        source_type: String,
        #[serde(default = "default_batch_size")]
        batch_size: usize,
        #[serde(default)]
        config: Value,
    },
    Transform {
        name: String,
        #[serde(rename = "type")]
        mapper_type: String,
        #[serde(default = "default_batch_size")]
        batch_size: usize,
        #[serde(default)]
        on_data_fault: DataFaultPolicy,
        #[serde(default)]
        config: Value,
    },
    Sink {
        name: String,
        #[serde(rename = "type")]
        sink_type: String,
        #[serde(default = "default_batch_size")]
        batch_size: usize,
        #[serde(default)]
        config: Value,
    },
}

impl StageConfig {
    pub fn name(&self) -> &str {
        match self {
            StageConfig::Source { name, .. }
            | StageConfig::Transform { name, .. }
            | StageConfig::Sink { name, .. } => name,
        }
    }

    pub fn batch_size(&self) -> usize {
        match self {
            StageConfig::Source { batch_size, .. }
            | StageConfig::Transform { batch_size, .. }
            | StageConfig::Sink { batch_size, .. } => *batch_size,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StageConfig::Source { .. } => "source",
            StageConfig::Transform { .. } => "transform",
            StageConfig::Sink { .. } => "sink",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,

    #[serde(default)]
    pub buffer: BufferKind,

    /// Longest an idle stage sleeps before polling again
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    /// How often the controller checks the exception handler
    #[serde(default = "default_supervise_interval_ms")]
    pub supervise_interval_ms: u64,

    /// Longest a clean stop waits for queued records to reach the sink
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    pub stages: Vec<StageConfig>,
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn supervise_interval(&self) -> Duration {
        Duration::from_millis(self.supervise_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Check the layout is `source, transform*, sink` with unique names and
    /// positive batch sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Missing("name".to_string()));
        }
        if self.idle_interval_ms == 0 {
            return Err(ConfigError::invalid("idle_interval_ms", "must be positive"));
        }
        if self.supervise_interval_ms == 0 {
            return Err(ConfigError::invalid("supervise_interval_ms", "must be positive"));
        }
        if self.stages.len() < 2 {
            return Err(ConfigError::invalid(
                "stages",
                "a pipeline needs at least a source and a sink",
            ));
        }

        let last = self.stages.len() - 1;
        let mut names = HashSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            let field = format!("stages[{}]", index);

            if stage.name().trim().is_empty() {
                return Err(ConfigError::Missing(format!("{}.name", field)));
            }
            if !names.insert(stage.name()) {
                return Err(ConfigError::invalid(
                    format!("{}.name", field),
                    format!("duplicate stage name '{}'", stage.name()),
                ));
            }
            if stage.batch_size() == 0 {
                return Err(ConfigError::invalid(
                    format!("{}.batch_size", field),
                    "must be a positive integer",
                ));
            }

            let expected = match index {
                0 => "source",
                i if i == last => "sink",
                _ => "transform",
            };
            if stage.kind() != expected {
                return Err(ConfigError::invalid(
                    format!("{}.kind", field),
                    format!("expected a {} stage, found {}", expected, stage.kind()),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "name": "test",
            "stages": [
                {"kind": "source", "name": "in", "type": "tcp",
                 "config": {"host": "localhost", "port": 7000}},
                {"kind": "sink", "name": "out", "type": "log"}
            ]
        })
    }

    #[test]
    fn test_defaults_applied() {
        let config = PipelineConfig::from_value(minimal()).unwrap();
        assert_eq!(config.buffer, BufferKind::Array);
        assert_eq!(config.idle_interval_ms, 50);
        assert_eq!(config.drain_timeout(), Duration::from_secs(5));
        assert_eq!(config.stages[0].batch_size(), 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut value = minimal();
        value["stages"][0]["batch_size"] = json!(0);
        let err = PipelineConfig::from_value(value).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_negative_batch_size_is_parse_error() {
        let mut value = minimal();
        value["stages"][0]["batch_size"] = json!(-5);
        assert!(matches!(
            PipelineConfig::from_value(value),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_layout_must_start_with_source() {
        let value = json!({
            "name": "test",
            "stages": [
                {"kind": "sink", "name": "out", "type": "log"},
                {"kind": "sink", "name": "out2", "type": "log"}
            ]
        });
        let err = PipelineConfig::from_value(value).unwrap_err();
        assert!(err.to_string().contains("expected a source stage"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut value = minimal();
        value["stages"][1]["name"] = json!("in");
        assert!(PipelineConfig::from_value(value).is_err());
    }
}
