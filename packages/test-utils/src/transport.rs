//! Scriptable transport for exercising the connection manager

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use chorale_sync_client::{
    Message, SyncError, SyncResult, Transport, TransportEvent, TransportEventSender,
    TransportFactory,
};

#[derive(Default)]
struct MockShared {
    sent: Mutex<Vec<String>>,
    created: AtomicUsize,
    closed: AtomicUsize,
    auto_open: AtomicBool,
    fail_sends: AtomicBool,
    /// Event sender of the most recently created transport
    events: Mutex<Option<TransportEventSender>>,
}

/// Factory producing scriptable in-memory transports
///
/// Every transport it creates shares one recording surface, so sent
/// frames accumulate across reconnect cycles. Tests drive the
/// connection by emitting events through the factory.
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    shared: Arc<MockShared>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `Opened` automatically when a created transport connects
    pub fn with_auto_open(self) -> Self {
        self.shared.auto_open.store(true, Ordering::SeqCst);
        self
    }

    /// Make subsequent writes fail until reset
    pub fn set_fail_sends(&self, fail: bool) {
        self.shared.fail_sends.store(fail, Ordering::SeqCst);
    }

    // ==== Scripted server-side events ====

    /// Report the current transport as opened
    pub fn open(&self) {
        self.emit(TransportEvent::Opened);
    }

    /// Simulate an unplanned connection drop
    pub fn drop_connection(&self) {
        self.emit(TransportEvent::Closed);
    }

    /// Simulate a socket-level error
    pub fn fail_connection(&self, error: impl Into<String>) {
        self.emit(TransportEvent::Errored(error.into()));
    }

    /// Deliver an inbound message as a serialized frame
    pub fn push_message(&self, message: &Message) {
        let frame = message.to_frame().expect("message serializes");
        self.emit(TransportEvent::Frame(frame));
    }

    /// Deliver a raw inbound frame (possibly malformed)
    pub fn push_frame(&self, frame: impl Into<String>) {
        self.emit(TransportEvent::Frame(frame.into()));
    }

    fn emit(&self, event: TransportEvent) {
        let guard = self.shared.events.lock();
        let sender = guard.as_ref().expect("no transport created yet");
        let _ = sender.send(event);
    }

    // ==== Recording queries ====

    /// Raw frames written across all created transports, in order
    pub fn sent_frames(&self) -> Vec<String> {
        self.shared.sent.lock().clone()
    }

    /// Written frames parsed back into messages
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent_frames()
            .iter()
            .map(|frame| Message::from_frame(frame).expect("sent frame parses"))
            .collect()
    }

    /// Frames of a given message type, in send order
    pub fn sent_of_type(&self, message_type: &str) -> Vec<Message> {
        self.sent_messages()
            .into_iter()
            .filter(|m| m.message_type == message_type)
            .collect()
    }

    /// How many transports have been created
    pub fn created(&self) -> usize {
        self.shared.created.load(Ordering::SeqCst)
    }

    /// How many transports have been closed
    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, _url: &str, events: TransportEventSender) -> Box<dyn Transport> {
        self.shared.created.fetch_add(1, Ordering::SeqCst);
        *self.shared.events.lock() = Some(events.clone());
        Box::new(MockTransport {
            events,
            shared: Arc::clone(&self.shared),
        })
    }
}

struct MockTransport {
    events: TransportEventSender,
    shared: Arc<MockShared>,
}

impl Transport for MockTransport {
    fn connect(&mut self) {
        if self.shared.auto_open.load(Ordering::SeqCst) {
            let _ = self.events.send(TransportEvent::Opened);
        }
    }

    fn send(&mut self, frame: &str) -> SyncResult<()> {
        if self.shared.fail_sends.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("mock write refused".to_string()));
        }
        self.shared.sent.lock().push(frame.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
    }
}
