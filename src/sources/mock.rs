use super::traits::{ConnectError, ReadOutcome, StreamSource};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One scripted step, consumed in order by `connect` and `read_unit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEvent {
    /// `connect` succeeds with this stream name
    Open(String),

    /// `connect` fails with "no data available"
    Refuse,

    /// `connect` fails unexpectedly
    ConnectFailure(io::ErrorKind),

    Unit(String),

    /// `read_unit` returns this text as a malformed unit
    Malformed(String),

    NotReady,
    End,

    /// `read_unit` fails with an I/O error
    ReadFailure(io::ErrorKind),
}

/// Source that replays a fixed script. For tests and demos.
///
/// When the script runs out, `connect` reports no data and `read_unit`
/// reports `NotReady`.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: VecDeque<ScriptEvent>,
    attached: bool,
    closes: Arc<AtomicUsize>,
    aborts: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = ScriptEvent>) -> Self {
        Self {
            script: script.into_iter().collect(),
            attached: false,
            closes: Arc::new(AtomicUsize::new(0)),
            aborts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script for a single complete stream: open, every unit, end.
    pub fn stream<S: Into<String>>(name: &str, units: impl IntoIterator<Item = S>) -> Self {
        let mut script = vec![ScriptEvent::Open(name.to_string())];
        script.extend(units.into_iter().map(|u| ScriptEvent::Unit(u.into())));
        script.push(ScriptEvent::End);
        Self::new(script)
    }

    /// Shared counter of `close` calls that released an attached stream
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }

    /// Shared counter of `abort` calls that released an attached stream
    pub fn abort_counter(&self) -> Arc<AtomicUsize> {
        self.aborts.clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    fn describe(&self) -> String {
        "script://".to_string()
    }

    async fn connect(&mut self) -> Result<String, ConnectError> {
        match self.script.pop_front() {
            Some(ScriptEvent::Open(name)) => {
                self.attached = true;
                Ok(name)
            }
            Some(ScriptEvent::ConnectFailure(kind)) => Err(ConnectError::Fatal(io::Error::new(
                kind,
                "scripted connect failure",
            ))),
            Some(ScriptEvent::Refuse) | None => {
                Err(ConnectError::Unavailable("scripted refusal".to_string()))
            }
            Some(other) => Err(ConnectError::Fatal(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("script expected a connect step, found {:?}", other),
            ))),
        }
    }

    async fn read_unit(&mut self) -> io::Result<ReadOutcome> {
        if !self.attached {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no stream attached"));
        }

        match self.script.pop_front() {
            Some(ScriptEvent::Unit(unit)) => Ok(ReadOutcome::Unit(unit)),
            Some(ScriptEvent::Malformed(unit)) => Ok(ReadOutcome::Malformed {
                unit,
                reason: "scripted malformed unit".to_string(),
            }),
            Some(ScriptEvent::End) => Ok(ReadOutcome::End),
            Some(ScriptEvent::NotReady) | None => Ok(ReadOutcome::NotReady),
            Some(ScriptEvent::ReadFailure(kind)) => {
                Err(io::Error::new(kind, "scripted read failure"))
            }
            Some(other) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("script expected a read step, found {:?}", other),
            )),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.attached {
            self.attached = false;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn abort(&mut self) -> io::Result<()> {
        if self.attached {
            self.attached = false;
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
