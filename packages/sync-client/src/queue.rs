//! Bounded FIFO buffer for outbound messages accepted while offline

use std::collections::VecDeque;

use crate::messages::Message;

/// Outbound messages awaiting transmission
///
/// Ring-buffer semantics: insertion past capacity evicts the oldest
/// entry and never blocks the caller. Used exclusively by the
/// connection manager.
#[derive(Debug)]
pub struct OfflineMessageQueue {
    capacity: usize,
    items: VecDeque<Message>,
}

impl OfflineMessageQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Change the capacity, evicting oldest entries past the new bound
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Append a message, dropping the oldest entry if full
    pub fn enqueue(&mut self, message: Message) {
        if self.items.len() == self.capacity {
            if let Some(dropped) = self.items.pop_front() {
                tracing::warn!(
                    message_type = %dropped.message_type,
                    capacity = self.capacity,
                    "Offline queue full, dropping oldest message"
                );
            }
        }
        self.items.push_back(message);
    }

    /// Atomically take the full contents in insertion order
    pub fn dequeue_all(&mut self) -> Vec<Message> {
        self.items.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
