use crate::resilience::{ExceptionHandler, FatalCondition};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct ContextInner {
    name: String,
    exceptions: Arc<ExceptionHandler>,
    streams_opened: AtomicU64,
}

/// State shared by every stage of one pipeline.
///
/// Cheap to clone; all clones refer to the same counters and handler.
#[derive(Clone)]
pub struct PipelineContext {
    inner: Arc<ContextInner>,
}

impl PipelineContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_handler(name, Arc::new(ExceptionHandler::new()))
    }

    /// Share an existing handler, e.g. one fault domain for several pipelines.
    pub fn with_handler(name: impl Into<String>, exceptions: Arc<ExceptionHandler>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name: name.into(),
                exceptions,
                streams_opened: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn exceptions(&self) -> &Arc<ExceptionHandler> {
        &self.inner.exceptions
    }

    pub fn report(&self, condition: FatalCondition) {
        self.inner.exceptions.report_exception(condition);
    }

    /// Count a newly opened stream. Returns the new total.
    pub fn record_stream_opened(&self) -> u64 {
        self.inner.streams_opened.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn streams_opened(&self) -> u64 {
        self.inner.streams_opened.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("name", &self.inner.name)
            .field("streams_opened", &self.streams_opened())
            .field("has_error", &self.inner.exceptions.has_error())
            .finish()
    }
}
