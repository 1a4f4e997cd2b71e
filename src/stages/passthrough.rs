use crate::core::{DataRecord, RecordError, RecordMapper};
use crate::error::ConfigError;
use serde_json::Value;

/// Mapper that leaves records untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

pub fn build(_config: &Value) -> Result<Box<dyn RecordMapper>, ConfigError> {
    Ok(Box::new(Passthrough))
}

impl RecordMapper for Passthrough {
    fn map(&mut self, _record: &mut DataRecord) -> Result<(), RecordError> {
        Ok(())
    }
}
