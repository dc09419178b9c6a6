//! Transport seam for the underlying duplex socket
//!
//! The socket itself is supplied externally; this module only defines
//! the trait the connection manager drives and the event stream it
//! listens to. A scriptable implementation for tests lives in the
//! `chorale-test-utils` package.

use tokio::sync::mpsc;

use crate::error::SyncResult;

/// Events emitted by a transport back to its owner
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Socket opened successfully
    Opened,
    /// Socket closed (clean or otherwise)
    Closed,
    /// Socket-level error; the transport is unusable afterwards
    Errored(String),
    /// A complete inbound frame
    Frame(String),
}

/// Sender half used by transports to report events
pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiver half consumed by the connection manager's event pump
pub type TransportEventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// A duplex socket primitive
///
/// Implementations report lifecycle and inbound frames through the
/// event sender handed to their factory; `connect` returns before the
/// socket necessarily opens.
pub trait Transport: Send {
    /// Begin establishing the connection
    fn connect(&mut self);

    /// Write one outbound frame
    fn send(&mut self, frame: &str) -> SyncResult<()>;

    /// Close the socket
    fn close(&mut self);
}

/// Creates transports on demand for reconnect cycles
pub trait TransportFactory: Send + Sync {
    /// Create a fresh transport wired to the given event sender
    fn create(&self, url: &str, events: TransportEventSender) -> Box<dyn Transport>;
}
