use super::transport::{BufferEvent, BufferMonitor, Endpoints, MonitorSet, RecordBuffer};
use crate::core::Record;
use std::collections::LinkedList;
use std::sync::{Arc, Mutex};

/// Buffer backed by a doubly linked list (O(1) head removal)
#[derive(Default)]
pub struct LinkedBuffer {
    queue: Mutex<LinkedList<Record>>,
    monitors: MonitorSet,
    endpoints: Endpoints,
}

impl LinkedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LinkedList<Record>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordBuffer for LinkedBuffer {
    fn push(&self, batch: Vec<Record>) {
        let pushed = batch.len();
        let queued = {
            let mut queue = self.lock();
            queue.extend(batch);
            queue.len()
        };

        self.monitors.notify(&BufferEvent {
            supplier: self.endpoints.supplier(),
            consumer: self.endpoints.consumer(),
            pushed,
            queued,
        });
    }

    fn pull(&self, max: usize) -> Vec<Record> {
        let mut queue = self.lock();
        let count = max.min(queue.len());
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            match queue.pop_front() {
                Some(record) => out.push(record),
                None => break,
            }
        }
        out
    }

    fn event_count(&self) -> usize {
        self.lock().len()
    }

    fn register_monitor(&self, monitor: Arc<dyn BufferMonitor>) {
        self.monitors.register(monitor);
    }

    fn supplier(&self) -> String {
        self.endpoints.supplier()
    }

    fn set_supplier(&self, name: &str) {
        self.endpoints.set_supplier(name);
    }

    fn consumer(&self) -> String {
        self.endpoints.consumer()
    }

    fn set_consumer(&self, name: &str) {
        self.endpoints.set_consumer(name);
    }
}
