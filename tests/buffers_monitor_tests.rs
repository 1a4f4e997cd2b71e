use recordflow::buffers::{
    ArrayBuffer, BufferEvent, BufferKind, BufferMonitor, ChannelMonitor, LinkedBuffer,
    RecordBuffer, WakeMonitor,
};
use recordflow::core::Record;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

#[derive(Default)]
struct CountingMonitor {
    calls: AtomicUsize,
}

impl BufferMonitor for CountingMonitor {
    fn on_push(&self, _event: &BufferEvent) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Drains the buffer from inside the notification
struct DrainingMonitor {
    buffer: Mutex<Weak<dyn RecordBuffer>>,
    drained: Mutex<Vec<Record>>,
}

impl BufferMonitor for DrainingMonitor {
    fn on_push(&self, _event: &BufferEvent) {
        let buffer = self.buffer.lock().unwrap().upgrade();
        if let Some(buffer) = buffer {
            let count = buffer.event_count();
            self.drained.lock().unwrap().extend(buffer.pull(count));
        }
    }
}

fn strategies() -> Vec<Arc<dyn RecordBuffer>> {
    vec![Arc::new(ArrayBuffer::new()), Arc::new(LinkedBuffer::new())]
}

#[test]
fn test_each_monitor_notified_once_per_push() {
    for buffer in strategies() {
        let first = Arc::new(CountingMonitor::default());
        let second = Arc::new(CountingMonitor::default());
        buffer.register_monitor(first.clone());
        buffer.register_monitor(second.clone());

        buffer.push(vec![Record::data("s", 0, "a"), Record::data("s", 1, "b")]);
        buffer.push(vec![Record::data("s", 2, "c")]);

        assert_eq!(first.calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.calls.load(Ordering::SeqCst), 2);
    }
}

#[test]
fn test_duplicate_registration_is_ignored() {
    let buffer = ArrayBuffer::new();
    let monitor = Arc::new(CountingMonitor::default());

    buffer.register_monitor(monitor.clone());
    buffer.register_monitor(monitor.clone());
    assert_eq!(buffer.monitor_count(), 1);

    buffer.push(vec![Record::header("s")]);
    assert_eq!(monitor.calls.load(Ordering::SeqCst), 1);

    let linked = LinkedBuffer::new();
    linked.register_monitor(monitor.clone());
    linked.register_monitor(monitor);
    assert_eq!(linked.monitor_count(), 1);
}

#[test]
fn test_empty_push_still_notifies() {
    for buffer in strategies() {
        let monitor = Arc::new(CountingMonitor::default());
        buffer.register_monitor(monitor.clone());

        buffer.push(Vec::new());
        assert_eq!(monitor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(buffer.event_count(), 0);
    }
}

#[test]
fn test_monitor_may_pull_from_same_buffer() {
    for buffer in strategies() {
        let monitor = Arc::new(DrainingMonitor {
            buffer: Mutex::new(Arc::downgrade(&buffer)),
            drained: Mutex::new(Vec::new()),
        });
        buffer.register_monitor(monitor.clone());

        buffer.push(vec![Record::data("s", 0, "a"), Record::data("s", 1, "b")]);

        assert_eq!(monitor.drained.lock().unwrap().len(), 2);
        assert_eq!(buffer.event_count(), 0);
    }
}

#[test]
fn test_channel_monitor_reports_event_details() {
    let buffer = BufferKind::Array.create("ingest", "archive");
    let (monitor, events) = ChannelMonitor::new();
    buffer.register_monitor(Arc::new(monitor));

    buffer.push(vec![Record::header("s"), Record::data("s", 0, "a")]);
    buffer.push(vec![Record::trailer("s")]);

    let first = events.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(first.supplier, "ingest");
    assert_eq!(first.consumer, "archive");
    assert_eq!(first.pushed, 2);
    assert_eq!(first.queued, 2);

    let second = events.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(second.pushed, 1);
    assert_eq!(second.queued, 3);
}

#[tokio::test]
async fn test_wake_monitor_keeps_permit_for_late_waiter() {
    let buffer = LinkedBuffer::new();
    let wake = Arc::new(WakeMonitor::new());
    buffer.register_monitor(wake.clone());

    // push before anyone waits
    buffer.push(vec![Record::header("s")]);

    tokio::time::timeout(Duration::from_secs(1), wake.wait())
        .await
        .expect("stored permit should wake the waiter");
    assert_eq!(wake.wakeups(), 1);
}
