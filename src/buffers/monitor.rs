use super::transport::{BufferEvent, BufferMonitor};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Wakes an idle stage task when its input buffer receives records.
///
/// `Notify::notify_one` stores a permit, so a push that lands between a
/// stage's empty pull and its wait is not lost.
#[derive(Debug, Default)]
pub struct WakeMonitor {
    notify: Arc<Notify>,
    wakeups: AtomicU64,
}

impl WakeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    pub fn wakeups(&self) -> u64 {
        self.wakeups.load(Ordering::Relaxed)
    }
}

impl BufferMonitor for WakeMonitor {
    fn on_push(&self, _event: &BufferEvent) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }
}

/// Forwards every buffer event over a crossbeam channel
pub struct ChannelMonitor {
    tx: Sender<BufferEvent>,
}

impl ChannelMonitor {
    pub fn new() -> (Self, Receiver<BufferEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl BufferMonitor for ChannelMonitor {
    fn on_push(&self, event: &BufferEvent) {
        // receiver gone means nobody is listening any more
        let _ = self.tx.try_send(event.clone());
    }
}
