use super::traits::{ConnectError, ReadOutcome, StreamSource};
use crate::error::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

fn default_extension() -> String {
    "dat".to_string()
}

fn default_done_suffix() -> String {
    "done".to_string()
}

/// Settings for a directory-polling file source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSourceConfig {
    pub directory: PathBuf,

    /// Only files with this extension are picked up
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Appended to a file's name once it has been fully read
    #[serde(default = "default_done_suffix")]
    pub done_suffix: String,
}

impl FileSourceConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extension: default_extension(),
            done_suffix: default_done_suffix(),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value.clone())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.directory.is_dir() {
            return Err(ConfigError::invalid(
                "directory",
                format!("{} is not a directory", self.directory.display()),
            ));
        }
        if self.extension.is_empty() {
            return Err(ConfigError::Missing("extension".to_string()));
        }
        if self.done_suffix.is_empty() || self.done_suffix == self.extension {
            return Err(ConfigError::invalid(
                "done_suffix",
                "must be non-empty and differ from the extension",
            ));
        }
        Ok(())
    }
}

struct OpenFile {
    path: PathBuf,
    reader: BufReader<File>,
}

/// Treats each matching file in a directory as one stream of lines.
///
/// Files are taken in name order. A file read to its end is renamed with the
/// done suffix so it is not picked up again; an aborted file keeps its name
/// and is read again from the start on the next `connect`.
pub struct FileSource {
    config: FileSourceConfig,
    current: Option<OpenFile>,
}

impl FileSource {
    pub fn new(config: FileSourceConfig) -> Self {
        Self {
            config,
            current: None,
        }
    }

    async fn next_candidate(&self) -> io::Result<Option<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.config.directory).await?;
        let mut candidates = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .extension()
                .map(|ext| ext == self.config.extension.as_str())
                .unwrap_or(false);
            if matches && entry.file_type().await?.is_file() {
                candidates.push(path);
            }
        }

        candidates.sort();
        Ok(candidates.into_iter().next())
    }

    fn done_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(&self.config.done_suffix);
        PathBuf::from(name)
    }
}

/// Registry factory
pub fn build(config: &Value) -> Result<Box<dyn StreamSource>, ConfigError> {
    Ok(Box::new(FileSource::new(FileSourceConfig::from_value(config)?)))
}

#[async_trait]
impl StreamSource for FileSource {
    fn describe(&self) -> String {
        format!(
            "file://{}/*.{}",
            self.config.directory.display(),
            self.config.extension
        )
    }

    async fn connect(&mut self) -> Result<String, ConnectError> {
        let path = match self.next_candidate().await {
            Ok(Some(path)) => path,
            Ok(None) => {
                return Err(ConnectError::Unavailable(format!(
                    "no .{} files in {}",
                    self.config.extension,
                    self.config.directory.display()
                )))
            }
            Err(e) => return Err(ConnectError::Fatal(e)),
        };

        let file = match File::open(&path).await {
            Ok(file) => file,
            // picked up by a parallel instance in the meantime
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConnectError::Unavailable(format!(
                    "{} disappeared",
                    path.display()
                )))
            }
            Err(e) => return Err(ConnectError::Fatal(e)),
        };

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.current = Some(OpenFile {
            path,
            reader: BufReader::new(file),
        });
        Ok(name)
    }

    async fn read_unit(&mut self) -> io::Result<ReadOutcome> {
        let Some(current) = self.current.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no file open"));
        };

        let mut raw = Vec::new();
        if current.reader.read_until(b'\n', &mut raw).await? == 0 {
            return Ok(ReadOutcome::End);
        }
        Ok(ReadOutcome::decode(raw))
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(current) = self.current.take() {
            drop(current.reader);
            let target = self.done_path(&current.path);
            tokio::fs::rename(&current.path, &target).await?;
            tracing::debug!("moved {} to {}", current.path.display(), target.display());
        }
        Ok(())
    }

    async fn abort(&mut self) -> io::Result<()> {
        if let Some(current) = self.current.take() {
            tracing::debug!(
                "left {} in place for a later pick-up",
                current.path.display()
            );
        }
        Ok(())
    }
}
