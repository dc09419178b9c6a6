//! Ledger of optimistic updates awaiting server confirmation

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::store::StoreAction;

/// A speculative mutation applied before server confirmation
#[derive(Debug, Clone)]
pub struct OptimisticUpdate {
    /// Action that was applied optimistically
    pub action: StoreAction,
    /// Action that undoes it if the server rejects the change
    pub rollback: StoreAction,
}

/// Tracks client-issued speculative mutations keyed by correlation id
///
/// Entries are never garbage-collected implicitly; every caller that
/// enqueues an entry must eventually confirm or roll it back.
#[derive(Default)]
pub struct OptimisticUpdateLedger {
    pending: Mutex<HashMap<String, OptimisticUpdate>>,
}

impl OptimisticUpdateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a speculative mutation under its correlation id
    pub fn enqueue(
        &self,
        correlation_id: impl Into<String>,
        action: StoreAction,
        rollback: StoreAction,
    ) {
        let correlation_id = correlation_id.into();
        let previous = self
            .pending
            .lock()
            .insert(correlation_id.clone(), OptimisticUpdate { action, rollback });
        if previous.is_some() {
            tracing::warn!(
                correlation_id = %correlation_id,
                "Replaced an unresolved optimistic update"
            );
        }
    }

    /// Server confirmed the change; the optimistic action stands
    ///
    /// Returns `None` for unknown ids, so a double confirmation is a
    /// no-op rather than an error.
    pub fn confirm(&self, correlation_id: &str) -> Option<OptimisticUpdate> {
        self.pending.lock().remove(correlation_id)
    }

    /// Server rejected the change; caller applies the returned rollback
    ///
    /// Returns `None` for unknown ids, so a double rollback is a no-op.
    pub fn rollback(&self, correlation_id: &str) -> Option<OptimisticUpdate> {
        self.pending.lock().remove(correlation_id)
    }

    /// Number of unresolved entries
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}
