use crate::core::{Record, RecordSink};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSinkConfig {
    /// Prefix for log lines; the stage name when absent
    label: Option<String>,
}

/// Logs every record it receives
pub struct LogSink {
    label: String,
}

impl LogSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

pub fn build(name: &str, config: &Value) -> std::result::Result<Box<dyn RecordSink>, ConfigError> {
    let config: LogSinkConfig = if config.is_null() {
        LogSinkConfig::default()
    } else {
        serde_json::from_value(config.clone())?
    };
    Ok(Box::new(LogSink::new(
        config.label.unwrap_or_else(|| name.to_string()),
    )))
}

#[async_trait]
impl RecordSink for LogSink {
    async fn consume(&mut self, batch: Vec<Record>) -> Result<()> {
        for record in &batch {
            match record {
                Record::Header { stream } => {
                    tracing::info!("[{}] stream '{}' started", self.label, stream)
                }
                Record::Trailer { stream } => {
                    tracing::info!("[{}] stream '{}' ended", self.label, stream)
                }
                Record::Data(data) if data.has_errors() => tracing::warn!(
                    "[{}] #{} of '{}' has {} error(s): {}",
                    self.label,
                    data.sequence,
                    data.stream,
                    data.errors.len(),
                    data.payload
                ),
                Record::Data(data) => tracing::debug!(
                    "[{}] #{} of '{}': {}",
                    self.label,
                    data.sequence,
                    data.stream,
                    data.payload
                ),
            }
        }
        Ok(())
    }
}
