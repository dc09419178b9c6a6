//! Real-time synchronization core for the Chorale music player
//!
//! This crate keeps a client's local player state consistent with a
//! Chorale server over a single persistent duplex connection, despite
//! disconnects, restarts, and concurrent consumers. It provides:
//! - One reference-counted connection shared by all consumers
//! - Reconnect with exponential backoff
//! - Type-based routing of inbound messages to subscribers
//! - A bounded offline queue flushed in order on reconnect
//! - Automatic replay of an in-progress continuous command (e.g. an
//!   active stream) after an unplanned disconnect
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chorale_sync_client::{
//!     ConnectionManager, Message, SyncConfig, SyncDispatcher,
//! };
//!
//! let config = SyncConfig::from_env()?;
//! let manager = ConnectionManager::new(config, transport_factory);
//! SyncDispatcher::attach(&manager.registry(), Arc::clone(&store));
//!
//! manager.spawn_event_pump();
//! manager.connect();
//! manager.send(Message::play("track-42", 0));
//! ```
//!
//! The underlying socket is supplied externally through the
//! [`TransportFactory`] seam; UI rendering and library CRUD live in
//! other crates.

mod config;
mod connection;
mod dispatcher;
mod error;
mod messages;
mod optimistic;
mod queue;
mod registry;
mod resume;
mod session;
mod store;
mod tracker;
mod transport;

pub use config::{ReconnectObserver, SyncConfig};
pub use connection::{reconnect_delay, ConnectionManager, ConnectionState, ScheduledReconnect};
pub use dispatcher::SyncDispatcher;
pub use error::{SyncError, SyncResult};
pub use messages::{
    InboundPayload, Message, MessageKind, PlaybackStatus, Priority, QueueTrack, RepeatMode,
    ServerErrorPayload, SyncedSettings,
};
pub use optimistic::{OptimisticUpdate, OptimisticUpdateLedger};
pub use queue::OfflineMessageQueue;
pub use registry::{Handler, Subscription, SubscriptionRegistry};
pub use resume::ResumeCandidateTracker;
pub use session::SessionState;
pub use store::{PlayerSnapshot, StateStore, StoreAction};
pub use tracker::{
    ErrorCategory, ErrorSink, ErrorTracker, RecoveryStrategy, TrackedError,
};
pub use transport::{
    Transport, TransportEvent, TransportEventReceiver, TransportEventSender, TransportFactory,
};
