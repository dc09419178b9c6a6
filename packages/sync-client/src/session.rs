//! Session-scoped state shared across connection manager rebuilds
//!
//! Upper layers tear the connection manager down and rebuild it during
//! re-initialization. Queued outbound work and the resume candidate
//! belong to the session, not to any one manager instance, so they live
//! here and survive those cycles for as long as the process does.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::DEFAULT_OFFLINE_QUEUE_CAPACITY;
use crate::messages::Message;
use crate::queue::OfflineMessageQueue;
use crate::resume::ResumeCandidateTracker;

static SHARED: OnceLock<Mutex<Option<Arc<SessionState>>>> = OnceLock::new();

/// Offline queue plus resume slot, owned by the session
#[derive(Debug)]
pub struct SessionState {
    inner: Mutex<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    queue: OfflineMessageQueue,
    resume: ResumeCandidateTracker,
}

impl SessionState {
    pub fn new(queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SessionInner {
                queue: OfflineMessageQueue::new(queue_capacity),
                resume: ResumeCandidateTracker::new(),
            }),
        })
    }

    /// The lazily-constructed process-wide session
    pub fn shared() -> Arc<Self> {
        let slot = SHARED.get_or_init(|| Mutex::new(None));
        let mut guard = slot.lock();
        guard
            .get_or_insert_with(|| Self::new(DEFAULT_OFFLINE_QUEUE_CAPACITY))
            .clone()
    }

    /// Drop the shared session; exposed for test harnesses only
    pub fn reset_shared() {
        if let Some(slot) = SHARED.get() {
            *slot.lock() = None;
        }
    }

    // ==== Offline queue ====

    /// Apply a configured queue bound; oldest entries past it are evicted
    pub fn set_queue_capacity(&self, capacity: usize) {
        self.inner.lock().queue.set_capacity(capacity);
    }

    pub fn enqueue(&self, message: Message) {
        self.inner.lock().queue.enqueue(message);
    }

    pub fn dequeue_all(&self) -> Vec<Message> {
        self.inner.lock().queue.dequeue_all()
    }

    pub fn queued_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn clear_queue(&self) {
        self.inner.lock().queue.clear();
    }

    // ==== Resume candidate ====

    pub fn note_connected_send(&self, message: &Message) {
        self.inner.lock().resume.observe_connected_send(message);
    }

    pub fn note_offline_send(&self, message: &Message) {
        self.inner.lock().resume.observe_offline_send(message);
    }

    pub fn resume_candidate(&self) -> Option<Message> {
        self.inner.lock().resume.candidate()
    }

    pub fn clear_resume_candidate(&self) {
        self.inner.lock().resume.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_survives_handle_drop() {
        let session = SessionState::new(10);
        session.enqueue(Message::seek(100));
        session.note_connected_send(&Message::play("track-1", 0));

        // A second handle to the same session sees the queued work,
        // the way a rebuilt connection manager would.
        let other = Arc::clone(&session);
        drop(session);

        assert_eq!(other.queued_len(), 1);
        assert!(other.resume_candidate().is_some());
    }

    #[test]
    fn test_shared_returns_same_session() {
        SessionState::reset_shared();
        let a = SessionState::shared();
        a.enqueue(Message::seek(1));

        let b = SessionState::shared();
        assert_eq!(b.queued_len(), 1);
        assert!(Arc::ptr_eq(&a, &b));

        SessionState::reset_shared();
        let c = SessionState::shared();
        assert_eq!(c.queued_len(), 0);
        SessionState::reset_shared();
    }
}
