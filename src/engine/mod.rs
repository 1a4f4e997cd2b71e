pub mod context;
pub mod control;
pub mod ingest;
pub mod pipeline;
pub mod scheduler;
pub mod stages;
pub mod state;

pub use context::PipelineContext;
pub use control::{ControlCommand, ControlResponse, QueueDepth};
pub use ingest::{AdapterState, StreamIngestionAdapter};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use scheduler::{StageExit, StageScheduler};
pub use stages::{IngestStage, SinkStage, TransformStage};
pub use state::PipelineState;
