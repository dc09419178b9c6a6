//! Error types for the sync core

use thiserror::Error;

/// Errors surfaced by the sync core
///
/// Transport drops and handler failures are absorbed into the reconnect
/// state machine and logging respectively, so this type only covers the
/// cases a caller can actually observe.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Underlying socket failed to accept a write
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed frame or payload
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::Transport("socket closed".into());
        assert_eq!(err.to_string(), "transport error: socket closed");

        let err = SyncError::Configuration("bad delay".into());
        assert_eq!(err.to_string(), "configuration error: bad delay");
    }
}
