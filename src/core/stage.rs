use super::{DataRecord, Record, RecordError};
use crate::buffers::SharedBuffer;
use crate::error::Result;
use async_trait::async_trait;

/// Result of one bounded cycle of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Records were moved (count of records handed downstream or consumed)
    Progress(usize),

    /// Nothing to do right now
    Idle,
}

impl CycleOutcome {
    pub fn from_count(count: usize) -> Self {
        if count == 0 {
            CycleOutcome::Idle
        } else {
            CycleOutcome::Progress(count)
        }
    }

    pub fn records(&self) -> usize {
        match self {
            CycleOutcome::Progress(n) => *n,
            CycleOutcome::Idle => 0,
        }
    }
}

/// Base trait for every stage the scheduler drives
#[async_trait]
pub trait PipelineStage: Send {
    fn name(&self) -> &str;

    /// Do a bounded amount of work and return.
    ///
    /// Must not block indefinitely: the scheduler checks for shutdown only
    /// between cycles.
    async fn run_cycle(&mut self) -> Result<CycleOutcome>;

    /// Release external resources. Called once when the stage task exits.
    async fn on_destroy(&mut self) -> Result<()> {
        Ok(())
    }

    /// Buffer this stage consumes from, if any. Used to wake the stage.
    fn input(&self) -> Option<SharedBuffer> {
        None
    }

    /// Buffer this stage produces into, if any.
    fn output(&self) -> Option<SharedBuffer> {
        None
    }
}

/// Payload-specific transformation applied to Data records
pub trait RecordMapper: Send {
    /// Populate or rewrite the record. An `Err` is a data fault.
    fn map(&mut self, record: &mut DataRecord) -> std::result::Result<(), RecordError>;
}

/// Terminal consumer of records
#[async_trait]
pub trait RecordSink: Send {
    async fn consume(&mut self, batch: Vec<Record>) -> Result<()>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Per-record callback used by ingestion adapters to retype records
pub trait RecordHook: Send {
    fn on_record(&mut self, record: Record) -> Record;
}

impl<F> RecordHook for F
where
    F: FnMut(Record) -> Record + Send,
{
    fn on_record(&mut self, record: Record) -> Record {
        self(record)
    }
}

/// Hook that returns every record unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl RecordHook for NoopHook {
    fn on_record(&mut self, record: Record) -> Record {
        record
    }
}
