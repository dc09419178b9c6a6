//! In-memory state store for dispatcher tests

use parking_lot::Mutex;

use chorale_sync_client::{PlayerSnapshot, StateStore, StoreAction};

/// State store that records every action and applies a minimal reducer
///
/// The reducer covers just enough semantics for snapshot-dependent
/// translations (queue advance, status batches) to behave like the
/// real store.
#[derive(Default)]
pub struct RecordingStore {
    actions: Mutex<Vec<StoreAction>>,
    snapshot: Mutex<PlayerSnapshot>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the queue; the first track becomes current
    pub fn with_queue(tracks: Vec<chorale_sync_client::QueueTrack>) -> Self {
        let store = Self::default();
        {
            let mut snapshot = store.snapshot.lock();
            snapshot.current_track = tracks.first().cloned();
            snapshot.queue = tracks;
            snapshot.queue_index = 0;
        }
        store
    }

    /// Every action dispatched so far, in order
    pub fn actions(&self) -> Vec<StoreAction> {
        self.actions.lock().clone()
    }

    fn reduce(snapshot: &mut PlayerSnapshot, action: &StoreAction) {
        match action {
            StoreAction::SetPosition { position_ms } => snapshot.position_ms = *position_ms,
            StoreAction::SetTrack { track } => snapshot.current_track = Some(track.clone()),
            StoreAction::SetPlaying(playing) => snapshot.is_playing = *playing,
            StoreAction::SetVolume(volume) => snapshot.volume = *volume,
            StoreAction::SetMuted(muted) => snapshot.is_muted = *muted,
            StoreAction::SetShuffle(shuffle) => snapshot.shuffle = *shuffle,
            StoreAction::SetRepeat(repeat) => snapshot.repeat = *repeat,
            StoreAction::QueueAppend { track } => snapshot.queue.push(track.clone()),
            StoreAction::QueueRemove { index } => {
                if *index < snapshot.queue.len() {
                    snapshot.queue.remove(*index);
                }
            }
            StoreAction::QueueAdvance => {
                snapshot.queue_index += 1;
                snapshot.current_track = snapshot.queue.get(snapshot.queue_index).cloned();
            }
            StoreAction::LoadTrack { .. }
            | StoreAction::ApplySettings(_)
            | StoreAction::PlayerError { .. }
            | StoreAction::LibraryError { .. }
            | StoreAction::SessionError { .. } => {}
        }
    }
}

impl StateStore for RecordingStore {
    fn dispatch(&self, action: StoreAction) {
        Self::reduce(&mut self.snapshot.lock(), &action);
        self.actions.lock().push(action);
    }

    fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.lock().clone()
    }
}
