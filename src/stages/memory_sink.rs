use crate::core::{Record, RecordSink};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Collects records in memory. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Record>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn consume(&mut self, batch: Vec<Record>) -> Result<()> {
        self.lock().extend(batch);
        Ok(())
    }
}
