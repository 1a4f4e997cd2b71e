pub mod record;
pub mod stage;

pub use record::{DataRecord, Record, RecordError, RecordKind};
pub use stage::{CycleOutcome, NoopHook, PipelineStage, RecordHook, RecordMapper, RecordSink};
