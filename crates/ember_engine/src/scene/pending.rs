//! Deferred structural mutations
//!
//! Both the scene (entities) and every entity (behaviors) keep a `PendingQueue`.
//! Mutations requested while a pass iterates the owner are queued here and
//! applied in enqueue order by a fixed-point drain: entries queued by callbacks
//! fired during the drain land behind the current ones and are applied by the
//! same drain, so a drain only returns once the queue is empty.

use std::collections::VecDeque;

/// Ordered queue of pending operations plus the owner's busy flag
#[derive(Debug)]
pub struct PendingQueue<T> {
    ops: VecDeque<T>,
    busy: bool,
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self {
            ops: VecDeque::new(),
            busy: false,
        }
    }
}

impl<T> PendingQueue<T> {
    /// Create an empty, idle queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an operation
    pub fn push(&mut self, op: T) {
        self.ops.push_back(op);
    }

    /// Take the oldest queued operation
    pub fn pop(&mut self) -> Option<T> {
        self.ops.pop_front()
    }

    /// Remove the first queued operation matching `predicate`
    ///
    /// Returns whether anything was removed.
    pub fn cancel(&mut self, predicate: impl Fn(&T) -> bool) -> bool {
        match self.ops.iter().position(predicate) {
            Some(index) => self.ops.remove(index).is_some(),
            None => false,
        }
    }

    /// Whether any queued operation matches `predicate`
    pub fn contains(&self, predicate: impl Fn(&T) -> bool) -> bool {
        self.ops.iter().any(predicate)
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of waiting operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Waiting operations in application order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.ops.iter()
    }

    /// Mark the owner busy; returns `false` if it already was
    ///
    /// Only the caller that got `true` drains and later calls [`Self::leave`].
    pub fn enter(&mut self) -> bool {
        !std::mem::replace(&mut self.busy, true)
    }

    /// Clear the busy flag
    pub fn leave(&mut self) {
        self.busy = false;
    }

    /// Whether a pass or drain currently holds the owner
    pub fn is_busy(&self) -> bool {
        self.busy
    }
}
