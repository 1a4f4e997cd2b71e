pub mod buffers;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod sources;
pub mod stages;

pub use config::{PipelineConfig, StageConfig};
pub use error::{ConfigError, PipelineError, Result};
pub use registry::ComponentRegistry;
