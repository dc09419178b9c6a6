//! Sync client configuration

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};

/// Default bound on the offline outbound queue
pub const DEFAULT_OFFLINE_QUEUE_CAPACITY: usize = 100;

/// Default bound on the tracked error history
pub const DEFAULT_ERROR_HISTORY_CAPACITY: usize = 50;

/// Observer invoked when a reconnect attempt is scheduled
pub type ReconnectObserver = Arc<dyn Fn(u32, Duration) + Send + Sync>;

/// Configuration for the sync connection
#[derive(Clone)]
pub struct SyncConfig {
    /// Server endpoint
    pub url: String,

    /// Give up after this many consecutive failed reconnects
    pub max_reconnect_attempts: u32,

    /// Delay before the first reconnect attempt
    pub initial_reconnect_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Ceiling on the reconnect delay
    pub max_reconnect_delay: Duration,

    /// Capacity of the offline outbound queue
    pub offline_queue_capacity: usize,

    /// Capacity of the tracked error history
    pub error_history_capacity: usize,

    /// Called with (attempt, delay) each time a reconnect is scheduled
    pub on_reconnect_attempt: Option<ReconnectObserver>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws".to_string(),
            max_reconnect_attempts: 10,
            initial_reconnect_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            max_reconnect_delay: Duration::from_millis(30_000),
            offline_queue_capacity: DEFAULT_OFFLINE_QUEUE_CAPACITY,
            error_history_capacity: DEFAULT_ERROR_HISTORY_CAPACITY,
            on_reconnect_attempt: None,
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("url", &self.url)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("initial_reconnect_delay", &self.initial_reconnect_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("max_reconnect_delay", &self.max_reconnect_delay)
            .field("offline_queue_capacity", &self.offline_queue_capacity)
            .field("error_history_capacity", &self.error_history_capacity)
            .field(
                "on_reconnect_attempt",
                &self.on_reconnect_attempt.as_ref().map(|_| "<observer>"),
            )
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults; set-but-invalid values are
    /// a configuration error rather than being silently ignored.
    pub fn from_env() -> SyncResult<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("CHORALE_SERVER_URL") {
            if !url.is_empty() {
                config.url = url;
            }
        }

        config.max_reconnect_attempts = parse_var(
            "CHORALE_MAX_RECONNECT_ATTEMPTS",
            config.max_reconnect_attempts,
        )?;
        config.initial_reconnect_delay = Duration::from_millis(parse_var(
            "CHORALE_RECONNECT_DELAY_MS",
            config.initial_reconnect_delay.as_millis() as u64,
        )?);
        config.max_reconnect_delay = Duration::from_millis(parse_var(
            "CHORALE_MAX_RECONNECT_DELAY_MS",
            config.max_reconnect_delay.as_millis() as u64,
        )?);
        config.backoff_multiplier =
            parse_var("CHORALE_BACKOFF_MULTIPLIER", config.backoff_multiplier)?;
        config.offline_queue_capacity = parse_var(
            "CHORALE_OFFLINE_QUEUE_CAPACITY",
            config.offline_queue_capacity,
        )?;
        config.error_history_capacity = parse_var(
            "CHORALE_ERROR_HISTORY_CAPACITY",
            config.error_history_capacity,
        )?;

        if config.backoff_multiplier < 1.0 {
            return Err(SyncError::Configuration(
                "CHORALE_BACKOFF_MULTIPLIER must be >= 1.0".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> SyncResult<T> {
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|_| SyncError::Configuration(format!("invalid {} value: {}", name, raw))),
        _ => Ok(default),
    }
}
