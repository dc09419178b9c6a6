//! Rolling error history with classification and recovery lookup

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::DEFAULT_ERROR_HISTORY_CAPACITY;

/// Error categories assigned by keyword heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Validation,
    Auth,
    Authz,
    Server,
    Client,
    Unknown,
}

impl ErrorCategory {
    /// Classify a message by keyword heuristics
    fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let contains = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

        if contains(&["network", "connection", "timeout", "socket", "offline"]) {
            Self::Network
        } else if contains(&["forbidden", "permission", "403"]) {
            Self::Authz
        } else if contains(&["unauthorized", "token", "credential", "login", "401"]) {
            Self::Auth
        } else if contains(&["invalid", "validation", "malformed", "missing"]) {
            Self::Validation
        } else if contains(&["server", "internal", "500", "503", "unavailable"]) {
            Self::Server
        } else if contains(&["client", "400"]) {
            Self::Client
        } else {
            Self::Unknown
        }
    }

    /// Default retry budget for this category
    fn max_retries(self) -> u32 {
        match self {
            Self::Network => 5,
            Self::Server => 3,
            _ => 0,
        }
    }
}

/// Suggested recovery for an error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    Reconnect,
    Retry,
    Reauthenticate,
    None,
}

/// One recorded error
#[derive(Debug, Clone)]
pub struct TrackedError {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub category: ErrorCategory,
    pub message: String,
    /// What the caller was doing when the error surfaced
    pub originating_action: String,
    pub context: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl TrackedError {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Callback invoked for each recorded error
pub type ErrorCallback = Arc<dyn Fn(&TrackedError) + Send + Sync>;

/// External logging sink; forwarding is best-effort
pub trait ErrorSink: Send + Sync {
    fn forward(&self, error: &TrackedError) -> Result<(), String>;
}

/// Bounded rolling history of errors surfaced anywhere in the stack
pub struct ErrorTracker {
    history: Mutex<VecDeque<TrackedError>>,
    capacity: usize,
    callback: Option<ErrorCallback>,
    sink: Option<Arc<dyn ErrorSink>>,
}

impl Default for ErrorTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_HISTORY_CAPACITY)
    }
}

impl ErrorTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
            callback: None,
            sink: None,
        }
    }

    /// Invoke a callback for every recorded error
    pub fn with_callback(mut self, callback: impl Fn(&TrackedError) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Forward recorded errors to an external sink, best-effort
    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Classify and record an error, evicting the oldest entry past capacity
    pub fn record(
        &self,
        originating_action: impl Into<String>,
        message: impl Into<String>,
    ) -> TrackedError {
        self.record_with_context(originating_action, message, None)
    }

    /// Record with an optional context tag
    pub fn record_with_context(
        &self,
        originating_action: impl Into<String>,
        message: impl Into<String>,
        context: Option<String>,
    ) -> TrackedError {
        let message = message.into();
        let category = ErrorCategory::classify(&message);
        let error = TrackedError {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            category,
            message,
            originating_action: originating_action.into(),
            context,
            retry_count: 0,
            max_retries: category.max_retries(),
        };

        tracing::warn!(
            id = %error.id,
            category = ?error.category,
            action = %error.originating_action,
            message = %error.message,
            "Error tracked"
        );

        {
            let mut history = self.history.lock();
            if history.len() == self.capacity {
                history.pop_front();
            }
            history.push_back(error.clone());
        }

        if let Some(callback) = &self.callback {
            callback(&error);
        }
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.forward(&error) {
                tracing::debug!(error = %e, "Error sink forwarding failed");
            }
        }

        error
    }

    /// Increment the retry counter for an error; `None` for unknown ids
    pub fn mark_retry(&self, id: Uuid) -> Option<u32> {
        let mut history = self.history.lock();
        let error = history.iter_mut().find(|e| e.id == id)?;
        error.retry_count += 1;
        Some(error.retry_count)
    }

    /// Suggested recovery for a category
    pub fn recovery_for(&self, category: ErrorCategory) -> RecoveryStrategy {
        match category {
            ErrorCategory::Network => RecoveryStrategy::Reconnect,
            ErrorCategory::Server => RecoveryStrategy::Retry,
            ErrorCategory::Auth => RecoveryStrategy::Reauthenticate,
            _ => RecoveryStrategy::None,
        }
    }

    // ==== Queries (diagnostics and tests) ====

    pub fn by_category(&self, category: ErrorCategory) -> Vec<TrackedError> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    pub fn by_action(&self, action: &str) -> Vec<TrackedError> {
        self.history
            .lock()
            .iter()
            .filter(|e| e.originating_action == action)
            .cloned()
            .collect()
    }

    /// Most recent errors, newest last
    pub fn recent(&self, count: usize) -> Vec<TrackedError> {
        let history = self.history.lock();
        history
            .iter()
            .skip(history.len().saturating_sub(count))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }
}
