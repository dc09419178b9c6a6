//! Shared test utilities for the Chorale workspace
//!
//! This crate provides mock implementations of the sync core's
//! external collaborators, for testing without a server or socket.
//!
//! # Mocks
//!
//! - [`MockTransportFactory`] - scriptable in-memory transport; tests
//!   emit open/close/error/frame events and inspect written frames
//! - [`RecordingStore`] - state store that records dispatched actions
//!   and applies a minimal reducer
//!
//! # Example
//!
//! ```rust,ignore
//! use chorale_sync_client::{ConnectionManager, SessionState, SyncConfig};
//! use chorale_test_utils::MockTransportFactory;
//!
//! let factory = MockTransportFactory::new().with_auto_open();
//! let manager = ConnectionManager::with_session(
//!     SyncConfig::default(),
//!     Box::new(factory.clone()),
//!     SessionState::new(100),
//! );
//! manager.connect();
//! manager.process_pending();
//! assert_eq!(factory.created(), 1);
//! ```

mod store;
mod transport;

pub use store::RecordingStore;
pub use transport::MockTransportFactory;
