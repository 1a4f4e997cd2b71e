use super::traits::{ConnectError, ReadOutcome, StreamSource};
use crate::error::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};

const READ_CHUNK: usize = 4096;

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_read_timeout_ms() -> u64 {
    50
}

fn default_max_line_bytes() -> usize {
    64 * 1024
}

/// Settings for a line-oriented TCP source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpSourceConfig {
    pub host: String,
    pub port: u16,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Longest a single `read_unit` call may wait for a complete line
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Lines longer than this are cut and delivered as malformed units
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl TcpSourceConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            max_line_bytes: default_max_line_bytes(),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value.clone())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing("host".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid("port", "must be between 1 and 65535"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid("connect_timeout_ms", "must be positive"));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::invalid("read_timeout_ms", "must be positive"));
        }
        if self.max_line_bytes == 0 {
            return Err(ConfigError::invalid("max_line_bytes", "must be positive"));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reads newline-terminated units from a TCP peer.
///
/// A zero-byte read marks the logical end of the stream. A `read_unit` call
/// waits at most `read_timeout_ms` in total, after which the source reports
/// `NotReady` and keeps any partial line for the next call. At most
/// `max_line_bytes` of an unterminated line are buffered.
pub struct TcpSource {
    config: TcpSourceConfig,
    stream: Option<TcpStream>,
    pending: Vec<u8>,
    eof: bool,
    /// Skipping the tail of an oversize line up to its newline
    discarding: bool,
    connections: u64,
}

impl TcpSource {
    pub fn new(config: TcpSourceConfig) -> Self {
        Self {
            config,
            stream: None,
            pending: Vec::new(),
            eof: false,
            discarding: false,
            connections: 0,
        }
    }

    pub fn config(&self) -> &TcpSourceConfig {
        &self.config
    }

    /// Next outcome that can be produced without touching the socket
    fn next_buffered(&mut self) -> Option<ReadOutcome> {
        let limit = self.config.max_line_bytes;

        if self.discarding {
            match self.pending.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.pending.drain(..=pos);
                    self.discarding = false;
                }
                None => {
                    self.pending.clear();
                    return self.eof.then_some(ReadOutcome::End);
                }
            }
        }

        match self.pending.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                if pos > limit {
                    Some(oversize(line, limit))
                } else {
                    Some(ReadOutcome::decode(line))
                }
            }
            None if self.pending.len() > limit => {
                let line = std::mem::take(&mut self.pending);
                self.discarding = !self.eof;
                Some(oversize(line, limit))
            }
            // unterminated last line
            None if self.eof && !self.pending.is_empty() => {
                Some(ReadOutcome::decode(std::mem::take(&mut self.pending)))
            }
            None if self.eof => Some(ReadOutcome::End),
            None => None,
        }
    }
}

/// Registry factory
pub fn build(config: &Value) -> Result<Box<dyn StreamSource>, ConfigError> {
    Ok(Box::new(TcpSource::new(TcpSourceConfig::from_value(config)?)))
}

fn is_unavailable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::TimedOut
            | io::ErrorKind::AddrNotAvailable
    )
}

fn oversize(mut line: Vec<u8>, limit: usize) -> ReadOutcome {
    line.truncate(limit);
    let unit = match ReadOutcome::decode(line) {
        ReadOutcome::Unit(unit) | ReadOutcome::Malformed { unit, .. } => unit,
        _ => String::new(),
    };
    ReadOutcome::Malformed {
        unit,
        reason: format!("line longer than {} bytes was cut", limit),
    }
}

#[async_trait]
impl StreamSource for TcpSource {
    fn describe(&self) -> String {
        format!("tcp://{}", self.config.address())
    }

    async fn connect(&mut self) -> Result<String, ConnectError> {
        let address = self.config.address();
        let limit = Duration::from_millis(self.config.connect_timeout_ms);

        let stream = match timeout(limit, TcpStream::connect(&address)).await {
            Err(_) => {
                return Err(ConnectError::Unavailable(format!(
                    "connect to {} timed out",
                    address
                )))
            }
            Ok(Err(e)) if is_unavailable(&e) => {
                return Err(ConnectError::Unavailable(format!("{}: {}", address, e)))
            }
            Ok(Err(e)) => return Err(ConnectError::Fatal(e)),
            Ok(Ok(stream)) => stream,
        };

        self.connections += 1;
        self.pending.clear();
        self.eof = false;
        self.discarding = false;
        self.stream = Some(stream);

        Ok(format!(
            "{}_{}_{:06}",
            self.config.host, self.config.port, self.connections
        ))
    }

    async fn read_unit(&mut self) -> io::Result<ReadOutcome> {
        let deadline = Instant::now() + Duration::from_millis(self.config.read_timeout_ms);

        loop {
            if let Some(outcome) = self.next_buffered() {
                return Ok(outcome);
            }

            let Some(stream) = self.stream.as_ref() else {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "no stream attached",
                ));
            };

            match timeout_at(deadline, stream.readable()).await {
                Err(_) => return Ok(ReadOutcome::NotReady),
                Ok(Err(e)) => return Err(e),
                Ok(Ok(())) => {}
            }

            let mut chunk = [0u8; READ_CHUNK];
            match stream.try_read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Ok(self.next_buffered().unwrap_or(ReadOutcome::NotReady));
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.eof = false;
        self.discarding = false;

        if let Some(mut stream) = self.stream.take() {
            match stream.shutdown().await {
                Err(e) if e.kind() != io::ErrorKind::NotConnected => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }

    /// A peer connection cannot be resumed, so aborting is the same as closing.
    async fn abort(&mut self) -> io::Result<()> {
        self.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = TcpSourceConfig::from_value(&json!({"host": "localhost", "port": 9000})).unwrap();
        assert_eq!(config.connect_timeout_ms, 1000);
        assert_eq!(config.read_timeout_ms, 50);
        assert_eq!(config.address(), "localhost:9000");
    }

    #[test]
    fn test_config_rejects_missing_host() {
        let err = TcpSourceConfig::from_value(&json!({"port": 9000})).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = TcpSourceConfig::from_value(&json!({"host": " ", "port": 9000})).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_config_rejects_port_zero() {
        let err = TcpSourceConfig::from_value(&json!({"host": "a", "port": 0})).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_rejects_zero_line_limit() {
        let err = TcpSourceConfig::from_value(&json!({"host": "a", "port": 1, "max_line_bytes": 0}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_oversize_line_kept_within_limit() {
        let mut source = TcpSource::new(TcpSourceConfig {
            max_line_bytes: 4,
            ..TcpSourceConfig::new("a", 1)
        });
        source.pending.extend_from_slice(b"abcdefgh");

        match source.next_buffered() {
            Some(ReadOutcome::Malformed { unit, .. }) => assert_eq!(unit, "abcd"),
            other => panic!("expected Malformed, got {:?}", other),
        }
        assert!(source.discarding);
        assert!(source.pending.is_empty());

        source.pending.extend_from_slice(b"ij\nok\n");
        assert_eq!(source.next_buffered(), Some(ReadOutcome::Unit("ok".into())));
        assert!(!source.discarding);
        assert_eq!(source.next_buffered(), None);
    }
}
