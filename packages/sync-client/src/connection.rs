//! Connection lifecycle management
//!
//! Owns exactly one transport at a time, no matter how many logical
//! consumers share the manager. Consumers attach and detach through
//! reference counting; the socket is only torn down when the last one
//! leaves. Unplanned drops are retried with exponential backoff, and a
//! successful reconnect first flushes the offline queue, then re-issues
//! the resume candidate.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::SyncConfig;
use crate::messages::Message;
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::session::SessionState;
use crate::tracker::ErrorTracker;
use crate::transport::{
    Transport, TransportEvent, TransportEventReceiver, TransportEventSender, TransportFactory,
};

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// A reconnect attempt waiting for its backoff delay to elapse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledReconnect {
    /// 0-based attempt index
    pub attempt: u32,
    pub delay: Duration,
}

/// Backoff delay for the given 0-based attempt index
///
/// `d(n) = min(initial × multiplier^n, max)`
pub fn reconnect_delay(config: &SyncConfig, attempt: u32) -> Duration {
    let factor = config.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
    let delay_ms = (config.initial_reconnect_delay.as_millis() as f64 * factor)
        .min(config.max_reconnect_delay.as_millis() as f64);
    Duration::from_millis(delay_ms as u64)
}

struct ManagerState {
    connection: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    owners: usize,
    reconnect_attempts: u32,
    scheduled: Option<ScheduledReconnect>,
    manual_disconnect: bool,
}

struct ManagerInner {
    config: SyncConfig,
    factory: Box<dyn TransportFactory>,
    session: Arc<SessionState>,
    registry: SubscriptionRegistry,
    tracker: Arc<ErrorTracker>,
    state: Mutex<ManagerState>,
    events_tx: TransportEventSender,
    events_rx: Mutex<Option<TransportEventReceiver>>,
}

/// Manages the single connection to the sync server
///
/// Cheaply cloneable handle; clones share the same underlying state.
/// All transport events are processed sequentially through
/// [`ConnectionManager::handle_event`], driven either by the async
/// event pump or manually via [`ConnectionManager::process_pending`].
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    /// Create a manager bound to the process-wide session state
    pub fn new(config: SyncConfig, factory: Box<dyn TransportFactory>) -> Self {
        Self::with_session(config, factory, SessionState::shared())
    }

    /// Create a manager with explicit session state (dependency injection)
    pub fn with_session(
        config: SyncConfig,
        factory: Box<dyn TransportFactory>,
        session: Arc<SessionState>,
    ) -> Self {
        session.set_queue_capacity(config.offline_queue_capacity);
        let tracker = Arc::new(ErrorTracker::new(config.error_history_capacity));
        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            inner: Arc::new(ManagerInner {
                config,
                factory,
                session,
                registry: SubscriptionRegistry::new(),
                tracker,
                state: Mutex::new(ManagerState {
                    connection: ConnectionState::Disconnected,
                    transport: None,
                    owners: 0,
                    reconnect_attempts: 0,
                    scheduled: None,
                    manual_disconnect: false,
                }),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        }
    }

    // ==== Owner lifecycle ====

    /// Attach a logical owner, establishing the socket if none is live
    ///
    /// Idempotent with respect to the physical connection: when a live
    /// transport already exists the caller is only counted as an
    /// additional owner.
    pub fn connect(&self) {
        let mut state = self.inner.state.lock();
        state.owners += 1;
        state.manual_disconnect = false;

        if state.transport.is_some() {
            tracing::debug!(owners = state.owners, "Attached owner to live connection");
            return;
        }

        state.reconnect_attempts = 0;
        state.scheduled = None;
        self.open_transport(&mut state);
    }

    /// Detach a logical owner; the socket closes when the last one leaves
    pub fn disconnect(&self) {
        let mut state = self.inner.state.lock();
        if state.owners == 0 {
            tracing::debug!("Ignoring unmatched disconnect");
            return;
        }

        state.owners -= 1;
        if state.owners > 0 {
            tracing::debug!(owners = state.owners, "Detached owner, connection stays open");
            return;
        }

        state.manual_disconnect = true;
        state.scheduled = None;
        if let Some(mut transport) = state.transport.take() {
            transport.close();
        }
        state.connection = ConnectionState::Disconnected;
        tracing::info!("Last owner detached, connection closed");
    }

    // ==== Outbound path ====

    /// Send a message, queueing it if no connection is live
    ///
    /// Never fails for the common offline case; resume bookkeeping is
    /// updated according to which path the message takes.
    pub fn send(&self, message: Message) {
        let mut state = self.inner.state.lock();

        if state.connection == ConnectionState::Connected {
            if self.write_to_transport(&mut state, &message) {
                self.inner.session.note_connected_send(&message);
                return;
            }
            tracing::warn!(
                message_type = %message.message_type,
                "Write failed on live connection, queueing message"
            );
        }

        self.inner.session.note_offline_send(&message);
        self.inner.session.enqueue(message);
    }

    fn write_to_transport(&self, state: &mut ManagerState, message: &Message) -> bool {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(
                    message_type = %message.message_type,
                    error = %e,
                    "Failed to serialize outbound message"
                );
                self.inner.tracker.record("serialize_message", e.to_string());
                return false;
            }
        };

        match state.transport.as_mut() {
            Some(transport) => match transport.send(&frame) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "Transport write failed");
                    self.inner.tracker.record("transport_write", e.to_string());
                    false
                }
            },
            None => false,
        }
    }

    // ==== Transport events ====

    /// Process one transport event
    ///
    /// Events must be fed in arrival order; the async pump and
    /// `process_pending` both guarantee that.
    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Frame(frame) => self.on_frame(&frame),
            TransportEvent::Closed => self.on_drop(None),
            TransportEvent::Errored(error) => self.on_drop(Some(error)),
        }
    }

    /// Drain events already queued without awaiting
    ///
    /// Used by callers that drive the manager manually (tests, embedded
    /// event loops). Production code runs [`Self::spawn_event_pump`]
    /// instead.
    pub fn process_pending(&self) {
        loop {
            let event = {
                let mut guard = self.inner.events_rx.lock();
                match guard.as_mut() {
                    Some(rx) => rx.try_recv().ok(),
                    None => None,
                }
            };
            match event {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    /// Drive transport events on the async runtime
    ///
    /// Reconnect delays are slept on separate tasks so the pump never
    /// stalls event processing.
    pub fn spawn_event_pump(&self) -> tokio::task::JoinHandle<()> {
        let receiver = self.inner.events_rx.lock().take();
        let manager = self.clone();

        tokio::spawn(async move {
            let Some(mut receiver) = receiver else {
                tracing::warn!("Event pump already running");
                return;
            };

            while let Some(event) = receiver.recv().await {
                manager.handle_event(event);

                if let Some(scheduled) = manager.take_scheduled_reconnect() {
                    let retry = manager.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(scheduled.delay).await;
                        retry.try_reconnect();
                    });
                }
            }
        })
    }

    fn on_open(&self) {
        let mut state = self.inner.state.lock();
        if state.transport.is_none() {
            // Stale event from a transport already torn down
            return;
        }

        state.connection = ConnectionState::Connected;
        state.reconnect_attempts = 0;
        state.scheduled = None;
        tracing::info!(url = %self.inner.config.url, "Connection established");

        self.flush_offline_queue(&mut state);
        self.reissue_resume_candidate(&mut state);
    }

    /// Flush queued messages in FIFO order, straight to the transport
    ///
    /// Flushed messages were already routed through the normal send path
    /// once; they must not update resume bookkeeping here, or a queued
    /// continuous command would be replayed again on the next reconnect.
    fn flush_offline_queue(&self, state: &mut ManagerState) {
        let queued = self.inner.session.dequeue_all();
        if queued.is_empty() {
            return;
        }

        tracing::debug!(count = queued.len(), "Flushing offline queue");
        let mut pending = queued.into_iter();
        while let Some(message) = pending.next() {
            if !self.write_to_transport(state, &message) {
                tracing::warn!("Flush interrupted, requeueing remaining messages");
                self.inner.session.enqueue(message);
                for rest in pending {
                    self.inner.session.enqueue(rest);
                }
                break;
            }
        }
    }

    /// Re-issue the resume candidate once, after the flush
    ///
    /// The candidate stays armed for subsequent reconnects until it is
    /// superseded or cancelled.
    fn reissue_resume_candidate(&self, state: &mut ManagerState) {
        if let Some(candidate) = self.inner.session.resume_candidate() {
            tracing::info!(
                message_type = %candidate.message_type,
                "Re-issuing resume candidate"
            );
            self.write_to_transport(state, &candidate);
        }
    }

    fn on_frame(&self, frame: &str) {
        match Message::from_frame(frame) {
            Ok(message) => {
                tracing::trace!(
                    message_type = %message.message_type,
                    correlation_id = %message.correlation_id,
                    "Inbound message"
                );
                self.inner.registry.dispatch(&message);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed inbound frame");
                self.inner.tracker.record("parse_frame", e.to_string());
            }
        }
    }

    fn on_drop(&self, error: Option<String>) {
        let observer_args = {
            let mut state = self.inner.state.lock();

            // A single physical drop can surface as an error event
            // followed by a close event; only the first one counts.
            if state.transport.is_none() {
                tracing::debug!("Ignoring drop event for an already-released transport");
                return;
            }

            state.transport = None;
            state.connection = match &error {
                Some(e) => {
                    tracing::warn!(error = %e, "Transport error");
                    self.inner.tracker.record("connection", e.clone());
                    ConnectionState::Error
                }
                None => ConnectionState::Disconnected,
            };

            if state.manual_disconnect || state.owners == 0 {
                state.connection = ConnectionState::Disconnected;
                return;
            }

            if state.reconnect_attempts >= self.inner.config.max_reconnect_attempts {
                tracing::error!(
                    attempts = state.reconnect_attempts,
                    "Reconnect attempts exhausted, manual connect required"
                );
                state.connection = ConnectionState::Disconnected;
                return;
            }

            let attempt = state.reconnect_attempts;
            let delay = reconnect_delay(&self.inner.config, attempt);
            state.reconnect_attempts += 1;
            state.scheduled = Some(ScheduledReconnect { attempt, delay });
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnect scheduled"
            );
            (attempt, delay)
        };

        // Observer runs outside the state lock so it may call back in
        if let Some(observer) = &self.inner.config.on_reconnect_attempt {
            observer(observer_args.0, observer_args.1);
        }
    }

    /// Take the reconnect attempt waiting for its delay, if any
    pub fn take_scheduled_reconnect(&self) -> Option<ScheduledReconnect> {
        self.inner.state.lock().scheduled.take()
    }

    /// Open a new transport if owners remain and none is live
    ///
    /// Called by the pump when a backoff delay elapses; also usable
    /// directly by callers driving the manager manually.
    pub fn try_reconnect(&self) {
        let mut state = self.inner.state.lock();
        if state.manual_disconnect || state.owners == 0 || state.transport.is_some() {
            return;
        }
        self.open_transport(&mut state);
    }

    fn open_transport(&self, state: &mut ManagerState) {
        state.connection = ConnectionState::Connecting;
        let mut transport = self
            .inner
            .factory
            .create(&self.inner.config.url, self.inner.events_tx.clone());
        transport.connect();
        state.transport = Some(transport);
        tracing::debug!(url = %self.inner.config.url, "Transport connecting");
    }

    // ==== Queries and subscriptions ====

    /// Current connection state, for offline/reconnecting affordances
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().connection
    }

    /// Number of attached logical owners
    pub fn owner_count(&self) -> usize {
        self.inner.state.lock().owners
    }

    /// The registry inbound messages are dispatched through
    pub fn registry(&self) -> SubscriptionRegistry {
        self.inner.registry.clone()
    }

    /// Rolling history of errors surfaced by this manager
    pub fn error_tracker(&self) -> Arc<ErrorTracker> {
        Arc::clone(&self.inner.tracker)
    }

    /// Register a handler for one inbound message type
    pub fn subscribe(
        &self,
        message_type: impl Into<String>,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.registry.subscribe(message_type, handler)
    }

    /// Register a handler for all inbound messages
    pub fn subscribe_all(
        &self,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.registry.subscribe_all(handler)
    }
}
