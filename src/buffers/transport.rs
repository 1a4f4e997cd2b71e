use crate::core::Record;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Notification delivered to monitors after a push has been committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferEvent {
    pub supplier: String,
    pub consumer: String,

    /// Records appended by the push that triggered the event
    pub pushed: usize,

    /// Queue length right after the push
    pub queued: usize,
}

/// Listener woken when a buffer receives new records
pub trait BufferMonitor: Send + Sync {
    fn on_push(&self, event: &BufferEvent);
}

/// FIFO transport between two adjacent stages.
///
/// `push`, `pull` and `event_count` are mutually exclusive on the queue.
/// Monitors run after the queue lock is released, so a monitor may call
/// back into the same buffer.
pub trait RecordBuffer: Send + Sync {
    /// Append `batch` at the tail and notify every monitor once.
    fn push(&self, batch: Vec<Record>);

    /// Remove up to `max` records from the head. Never blocks.
    fn pull(&self, max: usize) -> Vec<Record>;

    /// Current queue length
    fn event_count(&self) -> usize;

    /// Register a monitor. Registering the same instance twice is a no-op.
    fn register_monitor(&self, monitor: Arc<dyn BufferMonitor>);

    fn supplier(&self) -> String;
    fn set_supplier(&self, name: &str);
    fn consumer(&self) -> String;
    fn set_consumer(&self, name: &str);
}

pub type SharedBuffer = Arc<dyn RecordBuffer>;

/// Backing-store strategy for a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferKind {
    #[default]
    Array,
    Linked,
}

impl BufferKind {
    pub fn create(self, supplier: &str, consumer: &str) -> SharedBuffer {
        let buffer: SharedBuffer = match self {
            BufferKind::Array => Arc::new(super::ArrayBuffer::new()),
            BufferKind::Linked => Arc::new(super::LinkedBuffer::new()),
        };
        buffer.set_supplier(supplier);
        buffer.set_consumer(consumer);
        buffer
    }
}

/// Supplier/consumer names, diagnostic only
#[derive(Debug, Default)]
pub(crate) struct Endpoints {
    names: Mutex<(String, String)>,
}

impl Endpoints {
    pub(crate) fn supplier(&self) -> String {
        self.lock().0.clone()
    }

    pub(crate) fn consumer(&self) -> String {
        self.lock().1.clone()
    }

    pub(crate) fn set_supplier(&self, name: &str) {
        self.lock().0 = name.to_string();
    }

    pub(crate) fn set_consumer(&self, name: &str) {
        self.lock().1 = name.to_string();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, (String, String)> {
        self.names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Registered monitors, guarded separately from the queue
#[derive(Default)]
pub(crate) struct MonitorSet {
    monitors: Mutex<Vec<Arc<dyn BufferMonitor>>>,
}

impl MonitorSet {
    pub(crate) fn register(&self, monitor: Arc<dyn BufferMonitor>) {
        let mut monitors = self
            .monitors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !monitors.iter().any(|m| Arc::ptr_eq(m, &monitor)) {
            monitors.push(monitor);
        }
    }

    /// Call every monitor with `event`. The set lock is only held while
    /// taking a snapshot.
    pub(crate) fn notify(&self, event: &BufferEvent) {
        let snapshot: Vec<Arc<dyn BufferMonitor>> = self
            .monitors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for monitor in snapshot {
            monitor.on_push(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.monitors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
