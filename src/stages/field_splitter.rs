use crate::core::{DataRecord, RecordError, RecordMapper};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_strict() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSplitterConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Names assigned to the split values, in order
    pub fields: Vec<String>,

    /// Treat a value count different from `fields.len()` as a data fault
    #[serde(default = "default_strict")]
    pub strict: bool,
}

/// Splits a delimited payload into named fields
pub struct FieldSplitter {
    config: FieldSplitterConfig,
}

impl FieldSplitter {
    pub fn new(config: FieldSplitterConfig) -> Result<Self, ConfigError> {
        if config.delimiter.is_empty() {
            return Err(ConfigError::invalid("delimiter", "must not be empty"));
        }
        if config.fields.is_empty() {
            return Err(ConfigError::Missing("fields".to_string()));
        }
        Ok(Self { config })
    }
}

/// Registry factory
pub fn build(config: &Value) -> Result<Box<dyn RecordMapper>, ConfigError> {
    let config: FieldSplitterConfig = serde_json::from_value(config.clone())?;
    Ok(Box::new(FieldSplitter::new(config)?))
}

impl RecordMapper for FieldSplitter {
    fn map(&mut self, record: &mut DataRecord) -> Result<(), RecordError> {
        let values: Vec<&str> = record.payload.split(self.config.delimiter.as_str()).collect();
        let expected = self.config.fields.len();

        for (name, value) in self.config.fields.iter().zip(values.iter()) {
            record.fields.insert(name.clone(), value.trim().to_string());
        }

        if self.config.strict && values.len() != expected {
            return Err(RecordError::new(format!(
                "expected {} fields, found {}",
                expected,
                values.len()
            )));
        }
        Ok(())
    }
}
