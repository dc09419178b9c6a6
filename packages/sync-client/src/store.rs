//! State store collaborator seam
//!
//! The sync core never mutates player state directly; it dispatches
//! plain action objects to an external reactive store and re-reads
//! snapshots when a translation depends on derived state.

use crate::messages::{QueueTrack, RepeatMode, SyncedSettings};

/// Plain action objects accepted by the state store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    SetPosition { position_ms: u64 },
    SetTrack { track: QueueTrack },
    SetPlaying(bool),
    SetVolume(f32),
    SetMuted(bool),
    SetShuffle(bool),
    SetRepeat(RepeatMode),
    QueueAppend { track: QueueTrack },
    QueueRemove { index: usize },
    /// Advance to the next queue entry; which track becomes current is
    /// derived state, readable only after this action applies
    QueueAdvance,
    /// Begin loading a track into the audio pipeline
    LoadTrack { track_id: String },
    ApplySettings(SyncedSettings),
    PlayerError { code: String, message: String },
    LibraryError { code: String, message: String },
    SessionError { code: String, message: String },
}

/// Point-in-time view of the store's player slice
#[derive(Debug, Clone, Default)]
pub struct PlayerSnapshot {
    pub current_track: Option<QueueTrack>,
    pub queue: Vec<QueueTrack>,
    pub queue_index: usize,
    pub is_playing: bool,
    pub position_ms: u64,
    pub volume: f32,
    pub is_muted: bool,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

/// External reactive state store
///
/// `snapshot` must reflect every action already passed to `dispatch`;
/// handlers that react to an action's own effect re-read through it
/// rather than holding on to a pre-dispatch view.
pub trait StateStore: Send + Sync {
    fn dispatch(&self, action: StoreAction);
    fn snapshot(&self) -> PlayerSnapshot;
}
