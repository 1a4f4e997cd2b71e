use crate::core::{Record, RecordSink};
use crate::error::{ConfigError, PipelineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

fn default_extension() -> String {
    "out".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSinkConfig {
    pub directory: PathBuf,

    #[serde(default = "default_extension")]
    pub extension: String,
}

impl FileSinkConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extension: default_extension(),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.directory.is_dir() {
            return Err(ConfigError::invalid(
                "directory",
                format!("{} is not a directory", self.directory.display()),
            ));
        }
        if self.extension.is_empty() {
            return Err(ConfigError::Missing("extension".to_string()));
        }
        Ok(())
    }
}

struct OpenOutput {
    stream: String,
    temp_path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

/// Writes each stream to its own file, one JSON line per Data record.
///
/// Output goes to `<stream>.<ext>.tmp` and is renamed to `<stream>.<ext>` when
/// the stream's Trailer arrives, so complete files never appear half written.
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    current: Option<OpenOutput>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            current: None,
        }
    }

    fn final_path(&self, stream: &str) -> PathBuf {
        self.config
            .directory
            .join(format!("{}.{}", stream, self.config.extension))
    }

    async fn open(&mut self, stream: &str) -> Result<()> {
        if let Some(previous) = self.current.take() {
            tracing::warn!(
                "{}: stream '{}' ended without trailer, output left at {}",
                self.name,
                previous.stream,
                previous.temp_path.display()
            );
        }

        let temp_path = self
            .config
            .directory
            .join(format!("{}.{}.tmp", stream, self.config.extension));
        let file = File::create(&temp_path).await?;

        self.current = Some(OpenOutput {
            stream: stream.to_string(),
            temp_path,
            writer: BufWriter::new(file),
            written: 0,
        });
        Ok(())
    }

    async fn finish(&mut self, stream: &str) -> Result<()> {
        let Some(mut output) = self.current.take() else {
            return Err(PipelineError::stage(
                &self.name,
                format!("trailer for '{}' without an open stream", stream),
            ));
        };
        if output.stream != stream {
            let message = format!("trailer for '{}' while '{}' is open", stream, output.stream);
            self.current = Some(output);
            return Err(PipelineError::stage(&self.name, message));
        }

        output.writer.flush().await?;
        let target = self.final_path(stream);
        tokio::fs::rename(&output.temp_path, &target).await?;
        tracing::info!(
            "{}: wrote {} records to {}",
            self.name,
            output.written,
            target.display()
        );
        Ok(())
    }
}

/// Registry factory
pub fn build(name: &str, config: &Value) -> std::result::Result<Box<dyn RecordSink>, ConfigError> {
    let config: FileSinkConfig = serde_json::from_value(config.clone())?;
    config.validate()?;
    Ok(Box::new(FileSink::new(name, config)))
}

#[async_trait]
impl RecordSink for FileSink {
    async fn consume(&mut self, batch: Vec<Record>) -> Result<()> {
        for record in batch {
            match record {
                Record::Header { stream } => self.open(&stream).await?,
                Record::Trailer { stream } => self.finish(&stream).await?,
                Record::Data(data) => {
                    let Some(output) = self.current.as_mut() else {
                        return Err(PipelineError::stage(
                            &self.name,
                            format!(
                                "data record {} of '{}' outside an open stream",
                                data.sequence, data.stream
                            ),
                        ));
                    };

                    let mut line = serde_json::to_vec(&data)
                        .map_err(|e| PipelineError::stage(&self.name, e.to_string()))?;
                    line.push(b'\n');
                    output.writer.write_all(&line).await?;
                    output.written += 1;
                }
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut output) = self.current.take() {
            output.writer.flush().await?;
            tracing::warn!(
                "{}: closing with stream '{}' incomplete, output left at {}",
                self.name,
                output.stream,
                output.temp_path.display()
            );
        }
        Ok(())
    }
}
