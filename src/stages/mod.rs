pub mod field_splitter;
pub mod file_sink;
pub mod log_sink;
pub mod memory_sink;
pub mod passthrough;

pub use field_splitter::{FieldSplitter, FieldSplitterConfig};
pub use file_sink::{FileSink, FileSinkConfig};
pub use log_sink::LogSink;
pub use memory_sink::MemorySink;
pub use passthrough::Passthrough;
