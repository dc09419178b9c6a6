//! Resume candidate tracking for automatic replay after reconnect

use crate::messages::{Message, MessageKind};

/// Remembers the most recent continuous command sent while connected
///
/// The slot is overwritten by each continuous command that reaches the
/// connected send path, cleared by any terminal command regardless of
/// connection state, and left untouched by neutral traffic. Messages
/// flushed from the offline queue never pass through here; they were
/// already delivered once through the normal path.
#[derive(Debug, Default)]
pub struct ResumeCandidateTracker {
    slot: Option<Message>,
}

impl ResumeCandidateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message sent while connected
    pub fn observe_connected_send(&mut self, message: &Message) {
        match message.kind() {
            MessageKind::Continuous => {
                tracing::debug!(
                    message_type = %message.message_type,
                    "Resume candidate updated"
                );
                self.slot = Some(message.clone());
            }
            MessageKind::Terminal => self.clear(),
            MessageKind::Neutral => {}
        }
    }

    /// Record a message queued while offline
    ///
    /// A terminal command issued while the connection is down must still
    /// cancel any pending resume; continuous commands queued offline do
    /// not become candidates (the queue flush delivers them once).
    pub fn observe_offline_send(&mut self, message: &Message) {
        if message.kind() == MessageKind::Terminal {
            self.clear();
        }
    }

    /// The current candidate, if any
    ///
    /// Re-issuing the candidate leaves it in place; it stays armed for
    /// subsequent reconnects until superseded or cancelled.
    pub fn candidate(&self) -> Option<Message> {
        self.slot.clone()
    }

    pub fn clear(&mut self) {
        if self.slot.is_some() {
            tracing::debug!("Resume candidate cleared");
        }
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuous_sets_candidate() {
        let mut tracker = ResumeCandidateTracker::new();
        tracker.observe_connected_send(&Message::play("track-1", 0));
        assert_eq!(
            tracker.candidate().map(|m| m.message_type),
            Some("playback.play".to_string())
        );
    }

    #[test]
    fn test_latest_continuous_wins() {
        let mut tracker = ResumeCandidateTracker::new();
        tracker.observe_connected_send(&Message::play("track-1", 0));
        tracker.observe_connected_send(&Message::play("track-2", 500));

        let candidate = tracker.candidate().unwrap();
        assert_eq!(candidate.payload["track_id"], "track-2");
    }

    #[test]
    fn test_terminal_clears_candidate() {
        let mut tracker = ResumeCandidateTracker::new();
        tracker.observe_connected_send(&Message::play("track-1", 0));
        tracker.observe_connected_send(&Message::stop());
        assert!(tracker.candidate().is_none());
    }

    #[test]
    fn test_terminal_clears_even_when_offline() {
        let mut tracker = ResumeCandidateTracker::new();
        tracker.observe_connected_send(&Message::play("track-1", 0));
        tracker.observe_offline_send(&Message::pause());
        assert!(tracker.candidate().is_none());
    }

    #[test]
    fn test_offline_continuous_is_not_a_candidate() {
        let mut tracker = ResumeCandidateTracker::new();
        tracker.observe_offline_send(&Message::play("track-1", 0));
        assert!(tracker.candidate().is_none());
    }

    #[test]
    fn test_neutral_leaves_candidate_alone() {
        let mut tracker = ResumeCandidateTracker::new();
        tracker.observe_connected_send(&Message::play("track-1", 0));
        tracker.observe_connected_send(&Message::seek(1000));
        assert!(tracker.candidate().is_some());
    }
}
