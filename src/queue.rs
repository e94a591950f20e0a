use std::{
    collections::VecDeque,
    sync::{Arc, RwLock},
};

/// A clonable FIFO of runnable work, shared between the executor and every task's `Waker`.
///
/// The inner storage sits behind a lock because `Waker` is `Send + Sync`: another thread is
/// allowed to clone a waker and schedule work through it, even though the work itself only ever
/// runs on the executor's thread.  For the same reason the queue is only `Send` when `T` is.
#[derive(Clone)]
pub(crate) struct TaskQueue<T> {
    inner: Arc<RwLock<VecDeque<T>>>,
}

impl<T> TaskQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Pushes a new item onto the back of the queue.
    pub(crate) fn push(&self, value: T) {
        self.inner.write().unwrap().push_back(value);
    }

    /// Pops the item at the front of the queue, returning None if the queue is empty.
    pub(crate) fn pop(&self) -> Option<T> {
        self.inner.write().unwrap().pop_front()
    }

    /// Returns whether the queue is currently empty.
    pub(crate) fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}
