//! Translation of inbound messages into state store mutations
//!
//! Each known message type maps to one or more store actions. The
//! handlers are pure translations; anything that needs to know the
//! result of an action (e.g. which track is current after a queue
//! advance) re-reads the store after dispatching instead of relying on
//! a pre-dispatch snapshot.

use std::sync::Arc;

use crate::messages::{InboundPayload, Message, PlaybackStatus, ServerErrorPayload};
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::store::{StateStore, StoreAction};
use crate::tracker::ErrorTracker;

/// Message types the dispatcher translates
const HANDLED_TYPES: &[&str] = &[
    "playback.position",
    "playback.track",
    "playback.status",
    "playback.volume",
    "queue.add",
    "queue.remove",
    "queue.advance",
    "settings.sync",
    "stream.started",
    "stream.ended",
    "error",
    "pong",
];

/// Routes decoded inbound messages to the state store
pub struct SyncDispatcher;

impl SyncDispatcher {
    /// Register the translation table with a subscription registry
    ///
    /// One subscription per handled type; the returned handles keep the
    /// registrations alive until explicitly unsubscribed.
    pub fn attach(registry: &SubscriptionRegistry, store: Arc<dyn StateStore>) -> Vec<Subscription> {
        Self::attach_subscriptions(registry, store, None)
    }

    /// Like [`Self::attach`], but decode failures and unroutable server
    /// errors are also recorded in the given tracker
    pub fn attach_with_tracker(
        registry: &SubscriptionRegistry,
        store: Arc<dyn StateStore>,
        tracker: Arc<ErrorTracker>,
    ) -> Vec<Subscription> {
        Self::attach_subscriptions(registry, store, Some(tracker))
    }

    fn attach_subscriptions(
        registry: &SubscriptionRegistry,
        store: Arc<dyn StateStore>,
        tracker: Option<Arc<ErrorTracker>>,
    ) -> Vec<Subscription> {
        HANDLED_TYPES
            .iter()
            .map(|message_type| {
                let store = Arc::clone(&store);
                let tracker = tracker.clone();
                registry.subscribe(*message_type, move |message| {
                    Self::apply_tracked(message, store.as_ref(), tracker.as_deref());
                })
            })
            .collect()
    }

    /// Translate one inbound message into store mutations
    pub fn apply(message: &Message, store: &dyn StateStore) {
        Self::apply_tracked(message, store, None);
    }

    fn apply_tracked(message: &Message, store: &dyn StateStore, tracker: Option<&ErrorTracker>) {
        let payload = match message.decode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    message_type = %message.message_type,
                    correlation_id = %message.correlation_id,
                    error = %e,
                    "Dropping message with malformed payload"
                );
                if let Some(tracker) = tracker {
                    tracker.record_with_context(
                        "decode_message",
                        e.to_string(),
                        Some(message.message_type.clone()),
                    );
                }
                return;
            }
        };

        match payload {
            InboundPayload::PositionChanged(position) => {
                store.dispatch(StoreAction::SetPosition {
                    position_ms: position.position_ms,
                });
            }
            InboundPayload::TrackChanged(track) => {
                store.dispatch(StoreAction::SetTrack { track: track.track });
            }
            InboundPayload::StatusChanged(status) => Self::apply_status(status, store),
            InboundPayload::VolumeChanged(volume) => {
                store.dispatch(StoreAction::SetVolume(volume.volume));
            }
            InboundPayload::QueueAdded(track) => {
                store.dispatch(StoreAction::QueueAppend { track: track.track });
            }
            InboundPayload::QueueRemoved(index) => {
                store.dispatch(StoreAction::QueueRemove { index: index.index });
            }
            InboundPayload::QueueAdvanced => Self::apply_queue_advance(store),
            InboundPayload::SettingsSync(settings) => {
                store.dispatch(StoreAction::ApplySettings(settings));
            }
            InboundPayload::StreamStarted(started) => {
                store.dispatch(StoreAction::LoadTrack {
                    track_id: started.track_id,
                });
                store.dispatch(StoreAction::SetPlaying(true));
            }
            InboundPayload::StreamEnded => {
                store.dispatch(StoreAction::SetPlaying(false));
            }
            InboundPayload::ServerError(error) => Self::apply_server_error(error, store, tracker),
            InboundPayload::Pong(pong) => {
                tracing::trace!(server_time = pong.server_time, "Heartbeat acknowledged");
            }
            InboundPayload::Unrecognized { message_type } => {
                tracing::debug!(message_type = %message_type, "Ignoring unrecognized message type");
            }
        }
    }

    /// A status message batches several independent mutations
    fn apply_status(status: PlaybackStatus, store: &dyn StateStore) {
        store.dispatch(StoreAction::SetPlaying(status.is_playing));
        store.dispatch(StoreAction::SetPosition {
            position_ms: status.position_ms,
        });
        store.dispatch(StoreAction::SetVolume(status.volume));
        store.dispatch(StoreAction::SetMuted(status.is_muted));
        store.dispatch(StoreAction::SetShuffle(status.shuffle));
        store.dispatch(StoreAction::SetRepeat(status.repeat));
    }

    /// Advance the queue, then load whichever track is now current
    ///
    /// The current track after an advance is derived state: it must be
    /// re-read from the store after the advance applies. Reading it from
    /// a snapshot taken before the dispatch would load the wrong track.
    fn apply_queue_advance(store: &dyn StateStore) {
        store.dispatch(StoreAction::QueueAdvance);

        let after = store.snapshot();
        match after.current_track {
            Some(track) => store.dispatch(StoreAction::LoadTrack { track_id: track.id }),
            None => tracing::debug!("Queue advanced past the last track"),
        }
    }

    /// Route a protocol-level error to the store slice its context names
    fn apply_server_error(
        error: ServerErrorPayload,
        store: &dyn StateStore,
        tracker: Option<&ErrorTracker>,
    ) {
        match error.context.as_str() {
            "player" => store.dispatch(StoreAction::PlayerError {
                code: error.code,
                message: error.message,
            }),
            "library" => store.dispatch(StoreAction::LibraryError {
                code: error.code,
                message: error.message,
            }),
            "session" => store.dispatch(StoreAction::SessionError {
                code: error.code,
                message: error.message,
            }),
            other => {
                tracing::warn!(
                    context = %other,
                    code = %error.code,
                    message = %error.message,
                    "Server error with unrecognized context tag"
                );
                if let Some(tracker) = tracker {
                    tracker.record_with_context(
                        "server_error",
                        format!("{}: {}", error.code, error.message),
                        Some(other.to_string()),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::QueueTrack;
    use crate::store::PlayerSnapshot;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Store stub with just enough reducer logic for queue-advance tests
    #[derive(Default)]
    struct StubStore {
        actions: Mutex<Vec<StoreAction>>,
        snapshot: Mutex<PlayerSnapshot>,
    }

    impl StubStore {
        fn with_queue(tracks: Vec<QueueTrack>) -> Self {
            let store = Self::default();
            {
                let mut snapshot = store.snapshot.lock();
                snapshot.current_track = tracks.first().cloned();
                snapshot.queue = tracks;
                snapshot.queue_index = 0;
            }
            store
        }

        fn actions(&self) -> Vec<StoreAction> {
            self.actions.lock().clone()
        }
    }

    impl StateStore for StubStore {
        fn dispatch(&self, action: StoreAction) {
            if action == StoreAction::QueueAdvance {
                let mut snapshot = self.snapshot.lock();
                snapshot.queue_index += 1;
                snapshot.current_track = snapshot.queue.get(snapshot.queue_index).cloned();
            }
            self.actions.lock().push(action);
        }

        fn snapshot(&self) -> PlayerSnapshot {
            self.snapshot.lock().clone()
        }
    }

    fn track(id: &str) -> QueueTrack {
        QueueTrack {
            id: id.to_string(),
            title: format!("Title {}", id),
            artist: "Artist".to_string(),
            duration_ms: 180_000,
        }
    }

    #[test]
    fn test_position_translation() {
        let store = StubStore::default();
        let msg = Message::new("playback.position", json!({ "position_ms": 42 }));

        SyncDispatcher::apply(&msg, &store);
        assert_eq!(
            store.actions(),
            vec![StoreAction::SetPosition { position_ms: 42 }]
        );
    }

    #[test]
    fn test_status_batches_mutations() {
        let store = StubStore::default();
        let msg = Message::new(
            "playback.status",
            json!({
                "is_playing": true,
                "position_ms": 100,
                "volume": 0.5,
                "is_muted": false,
                "shuffle": false,
                "repeat": "off"
            }),
        );

        SyncDispatcher::apply(&msg, &store);

        let actions = store.actions();
        assert_eq!(actions.len(), 6);
        assert!(actions.contains(&StoreAction::SetPlaying(true)));
        assert!(actions.contains(&StoreAction::SetPosition { position_ms: 100 }));
        assert!(actions.contains(&StoreAction::SetVolume(0.5)));
    }

    #[test]
    fn test_queue_advance_reads_state_after_dispatch() {
        let store = StubStore::with_queue(vec![track("a"), track("b"), track("c")]);
        let msg = Message::new("queue.advance", serde_json::Value::Null);

        SyncDispatcher::apply(&msg, &store);

        // The loaded track must be the one current *after* the advance,
        // not the one from the pre-dispatch snapshot.
        assert_eq!(
            store.actions(),
            vec![
                StoreAction::QueueAdvance,
                StoreAction::LoadTrack {
                    track_id: "b".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_queue_advance_past_end_loads_nothing() {
        let store = StubStore::with_queue(vec![track("a")]);
        let msg = Message::new("queue.advance", serde_json::Value::Null);

        SyncDispatcher::apply(&msg, &store);
        assert_eq!(store.actions(), vec![StoreAction::QueueAdvance]);
    }

    #[test]
    fn test_settings_sync_translation() {
        let store = StubStore::default();
        let msg = Message::new(
            "settings.sync",
            json!({ "crossfade_enabled": true, "crossfade_duration": 2.5 }),
        );

        SyncDispatcher::apply(&msg, &store);
        assert_eq!(
            store.actions(),
            vec![StoreAction::ApplySettings(crate::messages::SyncedSettings {
                crossfade_enabled: Some(true),
                crossfade_duration: Some(2.5),
                gapless_enabled: None,
                normalize_volume: None,
            })]
        );
    }

    #[test]
    fn test_error_routing_by_context() {
        let store = StubStore::default();
        let msg = Message::new(
            "error",
            json!({ "context": "library", "code": "SCAN_FAILED", "message": "boom" }),
        );

        SyncDispatcher::apply(&msg, &store);
        assert_eq!(
            store.actions(),
            vec![StoreAction::LibraryError {
                code: "SCAN_FAILED".to_string(),
                message: "boom".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_error_context_only_logs() {
        let store = StubStore::default();
        let msg = Message::new(
            "error",
            json!({ "context": "telemetry", "code": "X", "message": "y" }),
        );

        SyncDispatcher::apply(&msg, &store);
        assert!(store.actions().is_empty());
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let store = StubStore::default();
        let msg = Message::new("playback.position", json!({ "position_ms": "not-a-number" }));

        SyncDispatcher::apply(&msg, &store);
        assert!(store.actions().is_empty());
    }

    #[test]
    fn test_tracker_records_decode_and_unroutable_errors() {
        let registry = SubscriptionRegistry::new();
        let store: Arc<StubStore> = Arc::new(StubStore::default());
        let tracker = Arc::new(ErrorTracker::default());
        let _subs =
            SyncDispatcher::attach_with_tracker(&registry, store.clone(), Arc::clone(&tracker));

        registry.dispatch(&Message::new(
            "playback.position",
            json!({ "position_ms": "nope" }),
        ));
        registry.dispatch(&Message::new(
            "error",
            json!({ "context": "telemetry", "code": "X", "message": "y" }),
        ));

        assert!(store.actions().is_empty());
        assert_eq!(tracker.by_action("decode_message").len(), 1);

        let unroutable = tracker.by_action("server_error");
        assert_eq!(unroutable.len(), 1);
        assert_eq!(unroutable[0].context.as_deref(), Some("telemetry"));
    }

    #[test]
    fn test_attach_registers_all_handled_types() {
        let registry = SubscriptionRegistry::new();
        let store: Arc<StubStore> = Arc::new(StubStore::default());
        let subs = SyncDispatcher::attach(&registry, store.clone());

        assert_eq!(subs.len(), HANDLED_TYPES.len());

        registry.dispatch(&Message::new("playback.position", json!({ "position_ms": 7 })));
        assert_eq!(
            store.actions(),
            vec![StoreAction::SetPosition { position_ms: 7 }]
        );
    }
}
