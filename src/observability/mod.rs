pub mod collector;
pub mod logging;
pub mod metrics;
pub mod report;

pub use collector::{MetricsCollector, MetricsSnapshot};
pub use logging::{init_tracing, LoggingConfig};
pub use metrics::StageMetrics;
pub use report::{PipelineReport, StageReport};
