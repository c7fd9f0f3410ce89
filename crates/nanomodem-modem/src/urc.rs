use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Order-preserving queue of raw unsolicited notifications.
///
/// The link reader appends from its own thread; the control loop pops at
/// most one entry per tick and never waits on it. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct UrcQueue {
    inner: Arc<Mutex<VecDeque<String>>>,
}

impl UrcQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notification as read from the link.
    pub fn push(&self, raw: impl Into<String>) {
        self.lock().push_back(raw.into());
    }

    /// Take the oldest notification, if any.
    pub fn pop(&self) -> Option<String> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panicking producer cannot leave a VecDeque half-written.
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
