//! Batch-bounded stream ingestion.
//!
//! [`StreamIngestionAdapter`] is called once per scheduler cycle. While idle it
//! tries to attach a stream; while streaming it reads at most `batch_size`
//! units and frames each stream with exactly one Header and one Trailer:
//!
//! ```text
//! Header(name), Data(0), Data(1), ..., Data(n-1), Trailer(name)
//! ```
//!
//! even when those records span many cycles.

use super::context::PipelineContext;
use crate::core::{NoopHook, Record, RecordError, RecordHook};
use crate::resilience::FatalCondition;
use crate::sources::{ConnectError, ReadOutcome, StreamSource};
use serde::{Deserialize, Serialize};

/// Adapter lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterState {
    /// No stream attached
    Idle,

    /// A stream is attached and being read
    Streaming,

    /// A read failed mid-stream. The stream was aborted and the adapter
    /// stays quiet until `reset` or teardown.
    Faulted,
}

pub struct StreamIngestionAdapter {
    name: String,
    source: Box<dyn StreamSource>,
    hook: Box<dyn RecordHook>,
    batch_size: usize,
    context: PipelineContext,
    state: AdapterState,
    record_sequence: u64,
    base_name: Option<String>,
}

impl StreamIngestionAdapter {
    /// `batch_size` must be positive; config validation guarantees this for
    /// assembled pipelines. Zero is treated as one.
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn StreamSource>,
        batch_size: usize,
        context: PipelineContext,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            hook: Box::new(NoopHook),
            batch_size: batch_size.max(1),
            context,
            state: AdapterState::Idle,
            record_sequence: 0,
            base_name: None,
        }
    }

    /// Replace the per-record hook (pass-through by default).
    pub fn with_hook(mut self, hook: impl RecordHook + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }

    pub fn with_boxed_hook(mut self, hook: Box<dyn RecordHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn stream_open(&self) -> bool {
        self.state == AdapterState::Streaming
    }

    pub fn base_name(&self) -> Option<&str> {
        self.base_name.as_deref()
    }

    /// Next sequence number to assign in the current stream
    pub fn record_sequence(&self) -> u64 {
        self.record_sequence
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Do one bounded cycle of work and return the records produced.
    pub async fn next_batch(&mut self) -> Vec<Record> {
        let mut batch = Vec::new();

        match self.state {
            AdapterState::Faulted => return batch,
            AdapterState::Idle => {
                if !self.open_stream(&mut batch).await {
                    return batch;
                }
            }
            AdapterState::Streaming => {}
        }

        self.read_stream(&mut batch).await;
        batch
    }

    /// Leave the Faulted state so the next cycle may attach a new stream.
    /// A stream still attached is aborted, not completed.
    pub async fn reset(&mut self) {
        if self.state != AdapterState::Idle {
            self.release(false).await;
        }
        self.state = AdapterState::Idle;
        self.base_name = None;
        self.record_sequence = 0;
    }

    /// Abort the attached stream, if any. Called at shutdown. The stream
    /// gets no Trailer and its input is left for a later pick-up.
    pub async fn shutdown(&mut self) {
        if self.state == AdapterState::Streaming {
            tracing::info!(
                "{}: aborting stream '{}' at shutdown after {} records",
                self.name,
                self.base_name.as_deref().unwrap_or_default(),
                self.record_sequence
            );
            self.release(false).await;
            self.state = AdapterState::Idle;
        }
    }

    async fn open_stream(&mut self, batch: &mut Vec<Record>) -> bool {
        match self.source.connect().await {
            Ok(stream) => {
                let total = self.context.record_stream_opened();
                tracing::info!(
                    "{}: opened stream '{}' from {} ({} streams so far)",
                    self.name,
                    stream,
                    self.source.describe(),
                    total
                );

                self.state = AdapterState::Streaming;
                self.record_sequence = 0;
                batch.push(self.hook.on_record(Record::header(stream.clone())));
                self.base_name = Some(stream);
                true
            }
            Err(ConnectError::Unavailable(reason)) => {
                tracing::debug!("{}: {}", self.name, reason);
                false
            }
            Err(e @ ConnectError::Fatal(_)) => {
                self.context
                    .report(FatalCondition::processing(&self.name, &e));
                false
            }
        }
    }

    async fn read_stream(&mut self, batch: &mut Vec<Record>) {
        let stream = self.base_name.clone().unwrap_or_default();
        let mut read = 0;

        while read < self.batch_size {
            match self.source.read_unit().await {
                Ok(ReadOutcome::Unit(payload)) => {
                    let record = Record::data(stream.as_str(), self.record_sequence, payload);
                    batch.push(self.hook.on_record(record));
                    self.record_sequence += 1;
                    read += 1;
                }
                Ok(ReadOutcome::Malformed { unit, reason }) => {
                    tracing::debug!(
                        "{}: malformed unit {} in stream '{}': {}",
                        self.name,
                        self.record_sequence,
                        stream,
                        reason
                    );
                    let mut record = Record::data(stream.as_str(), self.record_sequence, unit);
                    if let Some(data) = record.as_data_mut() {
                        data.add_error(RecordError::new(reason));
                    }
                    batch.push(self.hook.on_record(record));
                    self.record_sequence += 1;
                    read += 1;
                }
                Ok(ReadOutcome::NotReady) => return,
                Ok(ReadOutcome::End) => {
                    self.finish_stream(batch, stream).await;
                    return;
                }
                Err(e) => {
                    self.context.report(FatalCondition::processing(
                        &self.name,
                        format!("read failed on stream '{}': {}", stream, e),
                    ));
                    self.release(false).await;
                    self.state = AdapterState::Faulted;
                    return;
                }
            }
        }
    }

    async fn finish_stream(&mut self, batch: &mut Vec<Record>, stream: String) {
        tracing::info!(
            "{}: stream '{}' complete with {} records",
            self.name,
            stream,
            self.record_sequence
        );
        batch.push(self.hook.on_record(Record::trailer(stream)));
        self.release(true).await;
        self.state = AdapterState::Idle;
        self.base_name = None;
    }

    /// `completed` marks the input consumed; otherwise it stays available.
    async fn release(&mut self, completed: bool) {
        let result = if completed {
            self.source.close().await
        } else {
            self.source.abort().await
        };
        if let Err(e) = result {
            self.context.report(FatalCondition::processing(
                &self.name,
                format!("failed to close {}: {}", self.source.describe(), e),
            ));
        }
    }
}
