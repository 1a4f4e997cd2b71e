use super::ingest::StreamIngestionAdapter;
use crate::buffers::SharedBuffer;
use crate::core::{CycleOutcome, PipelineStage, Record, RecordMapper, RecordSink};
use crate::error::Result;
use crate::observability::StageMetrics;
use crate::resilience::DataFaultPolicy;
use async_trait::async_trait;
use std::sync::Arc;

/// Drives an ingestion adapter and pushes its batches downstream
pub struct IngestStage {
    adapter: StreamIngestionAdapter,
    output: SharedBuffer,
}

impl IngestStage {
    pub fn new(adapter: StreamIngestionAdapter, output: SharedBuffer) -> Self {
        Self { adapter, output }
    }

    pub fn adapter(&self) -> &StreamIngestionAdapter {
        &self.adapter
    }
}

#[async_trait]
impl PipelineStage for IngestStage {
    fn name(&self) -> &str {
        self.adapter.name()
    }

    async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let batch = self.adapter.next_batch().await;
        let count = batch.len();
        if count > 0 {
            self.output.push(batch);
        }
        Ok(CycleOutcome::from_count(count))
    }

    async fn on_destroy(&mut self) -> Result<()> {
        self.adapter.shutdown().await;
        Ok(())
    }

    fn output(&self) -> Option<SharedBuffer> {
        Some(self.output.clone())
    }
}

/// Applies a record mapper to every Data record between two buffers.
///
/// Mapping failures are data faults: handled per [`DataFaultPolicy`] and never
/// escalated.
pub struct TransformStage {
    name: String,
    input: SharedBuffer,
    output: SharedBuffer,
    mapper: Box<dyn RecordMapper>,
    policy: DataFaultPolicy,
    batch_size: usize,
    metrics: Arc<StageMetrics>,
}

impl TransformStage {
    pub fn new(
        name: impl Into<String>,
        input: SharedBuffer,
        output: SharedBuffer,
        mapper: Box<dyn RecordMapper>,
        batch_size: usize,
    ) -> Self {
        let name = name.into();
        Self {
            metrics: Arc::new(StageMetrics::new(name.as_str())),
            name,
            input,
            output,
            mapper,
            policy: DataFaultPolicy::default(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn with_policy(mut self, policy: DataFaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Count discards into `metrics` instead of a private counter.
    pub fn with_metrics(mut self, metrics: Arc<StageMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Records dropped under `DataFaultPolicy::Discard`
    pub fn discarded(&self) -> u64 {
        self.metrics.discarded()
    }

    fn apply(&mut self, mut record: Record) -> Option<Record> {
        let Some(data) = record.as_data_mut() else {
            return Some(record);
        };

        match self.mapper.map(data) {
            Ok(()) => Some(record),
            Err(fault) => match self.policy {
                DataFaultPolicy::Annotate => {
                    tracing::debug!(
                        "{}: record {} of '{}' annotated: {}",
                        self.name,
                        data.sequence,
                        data.stream,
                        fault.message
                    );
                    data.add_error(fault);
                    Some(record)
                }
                DataFaultPolicy::Discard => {
                    tracing::debug!(
                        "{}: record {} of '{}' discarded: {}",
                        self.name,
                        data.sequence,
                        data.stream,
                        fault.message
                    );
                    self.metrics.record_discarded();
                    None
                }
            },
        }
    }
}

#[async_trait]
impl PipelineStage for TransformStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let batch = self.input.pull(self.batch_size);
        if batch.is_empty() {
            return Ok(CycleOutcome::Idle);
        }

        let pulled = batch.len();
        let mapped: Vec<Record> = batch.into_iter().filter_map(|r| self.apply(r)).collect();
        if !mapped.is_empty() {
            self.output.push(mapped);
        }
        Ok(CycleOutcome::Progress(pulled))
    }

    fn input(&self) -> Option<SharedBuffer> {
        Some(self.input.clone())
    }

    fn output(&self) -> Option<SharedBuffer> {
        Some(self.output.clone())
    }
}

/// Hands batches from the last buffer to a record sink
pub struct SinkStage {
    name: String,
    input: SharedBuffer,
    sink: Box<dyn RecordSink>,
    batch_size: usize,
}

impl SinkStage {
    pub fn new(
        name: impl Into<String>,
        input: SharedBuffer,
        sink: Box<dyn RecordSink>,
        batch_size: usize,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            sink,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl PipelineStage for SinkStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let batch = self.input.pull(self.batch_size);
        let count = batch.len();
        if count > 0 {
            self.sink.consume(batch).await?;
        }
        Ok(CycleOutcome::from_count(count))
    }

    async fn on_destroy(&mut self) -> Result<()> {
        self.sink.close().await
    }

    fn input(&self) -> Option<SharedBuffer> {
        Some(self.input.clone())
    }
}
