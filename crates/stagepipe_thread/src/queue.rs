//! Blocking producer/consumer queues of instructions.
//!
//! Both variants wrap a `crossbeam_channel` pair behind a `parking_lot::RwLock`
//! so that `set_capacity` can atomically replace the underlying channel while
//! the queue is still unused. No polling: `pop` blocks on the channel's own
//! wait mechanism, never on a spin loop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;

use crate::error::QueueError;

/// A bounded FIFO queue. Producers block once `len() == capacity`.
pub struct BoundedQueue<T> {
    channel: RwLock<(Sender<T>, Receiver<T>)>,
    capacity: AtomicUsize,
    ever_pushed: AtomicBool,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "bounded queue capacity must be at least 1");
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self {
            channel: RwLock::new((tx, rx)),
            capacity: AtomicUsize::new(capacity),
            ever_pushed: AtomicBool::new(false),
        }
    }

    /// Replaces the queue's capacity. Only legal before the first `push`.
    pub fn set_capacity(&self, capacity: usize) -> Result<(), QueueError> {
        if self.ever_pushed.load(Ordering::Acquire) {
            return Err(QueueError::InvalidState {
                reason: "set_capacity must be called before pushing tasks".to_string(),
            });
        }
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        *self.channel.write() = (tx, rx);
        self.capacity.store(capacity, Ordering::Release);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Appends `task`, blocking the caller while the queue is at capacity.
    pub fn push(&self, task: T) {
        self.ever_pushed.store(true, Ordering::Release);
        let sender = self.channel.read().0.clone();
        sender
            .send(task)
            .expect("bounded queue receiver dropped while a sender is still live");
    }

    /// Removes and returns the oldest task, blocking while empty. Returns
    /// `None` only once every sender has been dropped.
    pub fn pop(&self) -> Option<T> {
        let receiver = self.channel.read().1.clone();
        receiver.recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.read().1.is_empty()
    }
}

/// An unbounded FIFO queue. `push` never blocks.
pub struct UnboundedQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> UnboundedQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    pub fn push(&self, task: T) {
        self.sender
            .send(task)
            .expect("unbounded queue receiver dropped while a sender is still live");
    }

    pub fn pop(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T> Default for UnboundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
