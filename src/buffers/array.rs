use super::transport::{BufferEvent, BufferMonitor, Endpoints, MonitorSet, RecordBuffer};
use crate::core::Record;
use std::sync::{Arc, Mutex};

/// Slots in front of the cursor are reclaimed once they exceed this and
/// make up at least half the storage.
const COMPACT_THRESHOLD: usize = 64;

#[derive(Default)]
struct Slots {
    items: Vec<Option<Record>>,
    head: usize,
}

impl Slots {
    fn len(&self) -> usize {
        self.items.len() - self.head
    }

    fn take_front(&mut self, max: usize) -> Vec<Record> {
        let count = max.min(self.len());
        let end = self.head + count;
        let out: Vec<Record> = self.items[self.head..end]
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        self.head = end;

        if self.head == self.items.len() {
            self.items.clear();
            self.head = 0;
        } else if self.head >= COMPACT_THRESHOLD && self.head * 2 >= self.items.len() {
            self.items.drain(..self.head);
            self.head = 0;
        }

        out
    }
}

/// Buffer backed by a growable array with a head cursor
#[derive(Default)]
pub struct ArrayBuffer {
    slots: Mutex<Slots>,
    monitors: MonitorSet,
    endpoints: Endpoints,
}

impl ArrayBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordBuffer for ArrayBuffer {
    fn push(&self, batch: Vec<Record>) {
        let pushed = batch.len();
        let queued = {
            let mut slots = self.lock();
            slots.items.extend(batch.into_iter().map(Some));
            slots.len()
        };

        self.monitors.notify(&BufferEvent {
            supplier: self.endpoints.supplier(),
            consumer: self.endpoints.consumer(),
            pushed,
            queued,
        });
    }

    fn pull(&self, max: usize) -> Vec<Record> {
        if max == 0 {
            return Vec::new();
        }
        self.lock().take_front(max)
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
