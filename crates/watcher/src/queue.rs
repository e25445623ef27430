//! Multi-producer event queue between raw watchers and the debouncer
//!
//! Producers never block; the single consumer blocks until an item arrives.

use crate::error::WatchError;
use crate::raw::RawSink;
use crossbeam_channel::{unbounded, Receiver, Sender};
use fsnorm_core::RawNotification;
use tracing::trace;

/// Item delivered to the consumer loop
#[derive(Debug)]
pub enum QueueItem {
    Raw(RawNotification),
    Error(WatchError),
}

/// Unbounded FIFO queue of raw notifications
pub struct EventQueue {
    tx: Sender<QueueItem>,
    rx: Receiver<QueueItem>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Producer handle, cheap to clone
    pub fn sender(&self) -> QueueSender {
        QueueSender {
            tx: self.tx.clone(),
        }
    }

    /// Split into the producer side and the consumer side
    pub fn split(self) -> (QueueSender, Receiver<QueueItem>) {
        (QueueSender { tx: self.tx }, self.rx)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the [`EventQueue`]
#[derive(Clone)]
pub struct QueueSender {
    tx: Sender<QueueItem>,
}

impl QueueSender {
    fn push(&self, item: QueueItem) {
        // Consumer gone means the session is shutting down
        if self.tx.send(item).is_err() {
            trace!("event queue closed, dropping item");
        }
    }
}

impl RawSink for QueueSender {
    fn notify(&self, notification: RawNotification) {
        self.push(QueueItem::Raw(notification));
    }

    fn error(&self, error: WatchError) {
        self.push(QueueItem::Error(error));
    }
}
