use async_trait::async_trait;
use std::io;
use thiserror::Error;

/// Result of asking an open stream for its next unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One decoded unit
    Unit(String),

    /// A unit that could not be read cleanly. The best-effort text is kept
    /// and travels downstream as a record annotated with `reason`.
    Malformed { unit: String, reason: String },

    /// Nothing ready yet; more may arrive later
    NotReady,

    /// The stream is finished and will never produce more data
    End,
}

impl ReadOutcome {
    /// Decode one raw line, dropping its terminator. Invalid UTF-8 yields
    /// `Malformed` with the offending bytes replaced.
    pub fn decode(mut raw: Vec<u8>) -> Self {
        while matches!(raw.last(), Some(b'\n') | Some(b'\r')) {
            raw.pop();
        }
        match String::from_utf8(raw) {
            Ok(unit) => ReadOutcome::Unit(unit),
            Err(e) => ReadOutcome::Malformed {
                reason: format!("invalid UTF-8 at byte {}", e.utf8_error().valid_up_to()),
                unit: String::from_utf8_lossy(e.as_bytes()).into_owned(),
            },
        }
    }
}

/// Why a connection attempt did not produce a stream
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Peer or input not ready. Expected during normal operation.
    #[error("no data available: {0}")]
    Unavailable(String),

    /// Anything else, e.g. name resolution or I/O failure
    #[error("failed to open stream: {0}")]
    Fatal(#[source] io::Error),
}

/// An external, continuously available input read one unit at a time.
///
/// Every method must return within a bounded time.
#[async_trait]
pub trait StreamSource: Send {
    /// Human-readable location, e.g. `tcp://host:port`
    fn describe(&self) -> String;

    /// Attach a new stream and return its identifying name.
    async fn connect(&mut self) -> Result<String, ConnectError>;

    /// Read the next unit of the attached stream.
    async fn read_unit(&mut self) -> io::Result<ReadOutcome>;

    /// Release a stream that reached its logical end, marking it consumed.
    /// Safe to call when nothing is attached.
    async fn close(&mut self) -> io::Result<()>;

    /// Release a stream that was not read to the end. The input must stay
    /// available for a later pick-up. Safe to call when nothing is attached.
    async fn abort(&mut self) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_strips_line_endings() {
        assert_eq!(ReadOutcome::decode(b"abc\r\n".to_vec()), ReadOutcome::Unit("abc".into()));
        assert_eq!(ReadOutcome::decode(b"abc".to_vec()), ReadOutcome::Unit("abc".into()));
    }

    #[test]
    fn test_decode_flags_invalid_utf8() {
        match ReadOutcome::decode(b"ok\xff\xfe\n".to_vec()) {
            ReadOutcome::Malformed { unit, reason } => {
                assert_eq!(unit, "ok\u{FFFD}\u{FFFD}");
                assert!(reason.contains("byte 2"));
            }
            other => panic!("expected Malformed, got {:?}", other),
        }
    }
}
