//! Subscription registry for inbound message routing
//!
//! Maps message types to handler sets plus a set of wildcard handlers.
//! One handler's failure never blocks delivery to the others, and
//! messages are dispatched one at a time in arrival order.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::messages::Message;

/// Callback invoked for each matching inbound message
pub type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    by_type: HashMap<String, Vec<(u64, Handler)>>,
    wildcard: Vec<(u64, Handler)>,
    next_id: u64,
}

/// Registry of message handlers
///
/// Cloneable handle; clones share the same handler table.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    // Serializes dispatch so messages are never processed concurrently
    // for a given registry, even across cloned handles.
    dispatch_lock: Arc<Mutex<()>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one message type
    ///
    /// The returned [`Subscription`] is the only way to remove the
    /// handler; dropping it without calling `unsubscribe` keeps the
    /// handler registered for the life of the registry.
    pub fn subscribe(
        &self,
        message_type: impl Into<String>,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Subscription {
        let message_type = message_type.into();
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .by_type
            .entry(message_type.clone())
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            inner: Arc::clone(&self.inner),
            id,
            message_type: Some(message_type),
        }
    }

    /// Register a handler for every inbound message
    pub fn subscribe_all(
        &self,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.wildcard.push((id, Arc::new(handler)));

        Subscription {
            inner: Arc::clone(&self.inner),
            id,
            message_type: None,
        }
    }

    /// Deliver a message to wildcard handlers, then type-specific ones
    ///
    /// Each handler runs isolated: a panic is caught, logged, and does
    /// not stop the remaining handlers or subsequent messages.
    pub fn dispatch(&self, message: &Message) {
        let _serial = self.dispatch_lock.lock();

        // Snapshot under the table lock, invoke outside it, so handlers
        // may subscribe or unsubscribe without deadlocking.
        let (wildcard, typed) = {
            let inner = self.inner.lock();
            let wildcard: Vec<Handler> =
                inner.wildcard.iter().map(|(_, h)| Arc::clone(h)).collect();
            let typed: Vec<Handler> = inner
                .by_type
                .get(&message.message_type)
                .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default();
            (wildcard, typed)
        };

        for handler in wildcard.iter().chain(typed.iter()) {
            if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                tracing::error!(
                    message_type = %message.message_type,
                    correlation_id = %message.correlation_id,
                    "Message handler panicked, continuing with remaining handlers"
                );
            }
        }
    }

    /// Number of registered handlers (wildcard included)
    pub fn handler_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.wildcard.len() + inner.by_type.values().map(Vec::len).sum::<usize>()
    }
}

/// Capability to remove a registered handler
pub struct Subscription {
    inner: Arc<Mutex<RegistryInner>>,
    id: u64,
    message_type: Option<String>,
}

impl Subscription {
    /// Remove the handler this subscription refers to
    pub fn unsubscribe(self) {
        let mut inner = self.inner.lock();
        match &self.message_type {
            Some(message_type) => {
                if let Some(handlers) = inner.by_type.get_mut(message_type) {
                    handlers.retain(|(id, _)| *id != self.id);
                    if handlers.is_empty() {
                        inner.by_type.remove(message_type);
                    }
                }
            }
            None => inner.wildcard.retain(|(id, _)| *id != self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn position_message() -> Message {
        Message::new("playback.position", serde_json::json!({ "position_ms": 1 }))
    }

    #[test]
    fn test_typed_dispatch() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let _sub = registry.subscribe("playback.position", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&position_message());
        registry.dispatch(&Message::new("queue.add", serde_json::Value::Null));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wildcard_receives_everything() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let _sub = registry.subscribe_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&position_message());
        registry.dispatch(&Message::new("queue.add", serde_json::Value::Null));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_handler_does_not_block_siblings() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = registry.subscribe("playback.position", |_| {
            panic!("handler blew up");
        });
        let counter = Arc::clone(&hits);
        let _good = registry.subscribe("playback.position", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&position_message());
        registry.dispatch(&position_message());

        // The sibling ran for every message despite the panicking handler
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_removes_handler() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let sub = registry.subscribe("playback.position", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&position_message());
        sub.unsubscribe();
        registry.dispatch(&position_message());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.handler_count(), 0);
    }

    #[test]
    fn test_wildcard_runs_before_typed() {
        let registry = SubscriptionRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&order);
        let _typed = registry.subscribe("playback.position", move |_| {
            log.lock().push("typed");
        });
        let log = Arc::clone(&order);
        let _wild = registry.subscribe_all(move |_| {
            log.lock().push("wildcard");
        });

        registry.dispatch(&position_message());
        assert_eq!(*order.lock(), vec!["wildcard", "typed"]);
    }
}
