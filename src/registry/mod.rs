use crate::core::{RecordMapper, RecordSink};
use crate::error::{ConfigError, PipelineError, Result};
use crate::sources::StreamSource;
use serde_json::Value;
use std::collections::HashMap;

type SourceFactory =
    Box<dyn Fn(&Value) -> std::result::Result<Box<dyn StreamSource>, ConfigError> + Send + Sync>;
type MapperFactory =
    Box<dyn Fn(&Value) -> std::result::Result<Box<dyn RecordMapper>, ConfigError> + Send + Sync>;
type SinkFactory = Box<
    dyn Fn(&str, &Value) -> std::result::Result<Box<dyn RecordSink>, ConfigError> + Send + Sync,
>;

/// Factories for the component types a configuration may name
pub struct ComponentRegistry {
    sources: HashMap<String, SourceFactory>,
    mappers: HashMap<String, MapperFactory>,
    sinks: HashMap<String, SinkFactory>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            mappers: HashMap::new(),
            sinks: HashMap::new(),
        }
    }

    /// Registry with the bundled components
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_source("tcp", crate::sources::tcp::build);
        registry.register_source("file", crate::sources::file::build);
        registry.register_mapper("passthrough", crate::stages::passthrough::build);
        registry.register_mapper("field_splitter", crate::stages::field_splitter::build);
        registry.register_sink("file", crate::stages::file_sink::build);
        registry.register_sink("log", crate::stages::log_sink::build);
        registry
    }

    pub fn register_source<F>(&mut self, source_type: &str, factory: F)
    where
        F: Fn(&Value) -> std::result::Result<Box<dyn StreamSource>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.sources.insert(source_type.to_string(), Box::new(factory));
    }

    pub fn register_mapper<F>(&mut self, mapper_type: &str, factory: F)
    where
        F: Fn(&Value) -> std::result::Result<Box<dyn RecordMapper>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.mappers.insert(mapper_type.to_string(), Box::new(factory));
    }

    pub fn register_sink<F>(&mut self, sink_type: &str, factory: F)
    where
        F: Fn(&str, &Value) -> std::result::Result<Box<dyn RecordSink>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.sinks.insert(sink_type.to_string(), Box::new(factory));
    }

    pub fn create_source(&self, source_type: &str, config: &Value) -> Result<Box<dyn StreamSource>> {
        let factory = self
            .sources
            .get(source_type)
            .ok_or_else(|| PipelineError::UnknownComponent {
                kind: "source",
                name: source_type.to_string(),
            })?;
        Ok(factory(config)?)
    }

    pub fn create_mapper(&self, mapper_type: &str, config: &Value) -> Result<Box<dyn RecordMapper>> {
        let factory = self
            .mappers
            .get(mapper_type)
            .ok_or_else(|| PipelineError::UnknownComponent {
                kind: "mapper",
                name: mapper_type.to_string(),
            })?;
        Ok(factory(config)?)
    }

    /// `stage` is the configured stage name, passed through for log labels.
    pub fn create_sink(
        &self,
        sink_type: &str,
        stage: &str,
        config: &Value,
    ) -> Result<Box<dyn RecordSink>> {
        let factory = self
            .sinks
            .get(sink_type)
            .ok_or_else(|| PipelineError::UnknownComponent {
                kind: "sink",
                name: sink_type.to_string(),
            })?;
        Ok(factory(stage, config)?)
    }

    pub fn list_sources(&self) -> Vec<String> {
        sorted_keys(&self.sources)
    }

    pub fn list_mappers(&self) -> Vec<String> {
        sorted_keys(&self.mappers)
    }

    pub fn list_sinks(&self) -> Vec<String> {
        sorted_keys(&self.sinks)
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
