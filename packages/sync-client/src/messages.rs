//! Wire message types for real-time synchronization
//!
//! This module defines the message envelope exchanged with the Chorale
//! server over the persistent connection, plus the typed decoding of
//! inbound payloads. Messages are serialized as JSON; the `type` field
//! is the routing key and payloads are opaque until decoded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::SyncResult;

/// Delivery priority attached to every message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Classification of a message type for resume bookkeeping
///
/// Continuous types start or maintain an ongoing operation and are
/// eligible for automatic replay after a reconnect. Terminal types
/// explicitly end one and cancel any pending replay. Everything else
/// is neutral and never touches the resume slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Continuous,
    Terminal,
    Neutral,
}

impl MessageKind {
    /// Classify a message type string
    pub fn classify(message_type: &str) -> Self {
        match message_type {
            "playback.play" | "stream.start" => Self::Continuous,
            "playback.stop" | "playback.pause" | "stream.stop" => Self::Terminal,
            _ => Self::Neutral,
        }
    }
}

/// Message envelope exchanged with the server
///
/// Immutable once constructed. `message_type` is the routing key;
/// `payload` stays opaque until [`Message::decode`] is called.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Routing key (e.g. `playback.play`, `queue.add`)
    #[serde(rename = "type")]
    pub message_type: String,

    /// Opaque id linking this message to a later confirmation/rollback
    pub correlation_id: String,

    /// When the message was constructed (ISO-8601 on the wire)
    pub timestamp: DateTime<Utc>,

    /// Delivery priority
    #[serde(default)]
    pub priority: Priority,

    /// Type-dependent payload, opaque at this layer
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    /// Create a message with a fresh correlation id and current timestamp
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type: message_type.into(),
            correlation_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            priority: Priority::Normal,
            payload,
        }
    }

    /// Override the default priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    // ==== Outbound command constructors ====

    /// Start streaming a track (continuous command)
    pub fn play(track_id: impl Into<String>, position_ms: u64) -> Self {
        Self::new(
            "playback.play",
            json!({ "track_id": track_id.into(), "position_ms": position_ms }),
        )
        .with_priority(Priority::High)
    }

    /// Pause the active stream (terminal command)
    pub fn pause() -> Self {
        Self::new("playback.pause", Value::Null).with_priority(Priority::High)
    }

    /// Stop the active stream (terminal command)
    pub fn stop() -> Self {
        Self::new("playback.stop", Value::Null).with_priority(Priority::High)
    }

    /// Seek within the current track
    pub fn seek(position_ms: u64) -> Self {
        Self::new("playback.seek", json!({ "position_ms": position_ms }))
    }

    /// Append a track to the play queue
    pub fn queue_add(track: &QueueTrack) -> Self {
        Self::new("queue.add", json!({ "track": track }))
    }

    /// Remove a track from the play queue by index
    pub fn queue_remove(index: usize) -> Self {
        Self::new("queue.remove", json!({ "index": index }))
    }

    /// Set playback volume
    pub fn set_volume(volume: f32) -> Self {
        Self::new("playback.volume", json!({ "volume": volume }))
    }

    /// Keep-alive heartbeat
    pub fn heartbeat() -> Self {
        Self::new("heartbeat", Value::Null).with_priority(Priority::Low)
    }

    // ==== Wire codec ====

    /// Serialize for transmission
    pub fn to_frame(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a received frame
    pub fn from_frame(frame: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Classify for resume bookkeeping
    pub fn kind(&self) -> MessageKind {
        MessageKind::classify(&self.message_type)
    }

    /// Decode the opaque payload into a typed inbound variant
    ///
    /// Unknown types map to [`InboundPayload::Unrecognized`] rather than
    /// an error; malformed payloads for a known type are an error.
    pub fn decode(&self) -> SyncResult<InboundPayload> {
        let payload = self.payload.clone();
        let decoded = match self.message_type.as_str() {
            "playback.position" => serde_json::from_value(payload).map(InboundPayload::PositionChanged)?,
            "playback.track" => serde_json::from_value(payload).map(InboundPayload::TrackChanged)?,
            "playback.status" => serde_json::from_value(payload).map(InboundPayload::StatusChanged)?,
            "playback.volume" => serde_json::from_value(payload).map(InboundPayload::VolumeChanged)?,
            "queue.add" => serde_json::from_value(payload).map(InboundPayload::QueueAdded)?,
            "queue.remove" => serde_json::from_value(payload).map(InboundPayload::QueueRemoved)?,
            "queue.advance" => InboundPayload::QueueAdvanced,
            "settings.sync" => serde_json::from_value(payload).map(InboundPayload::SettingsSync)?,
            "stream.started" => serde_json::from_value(payload).map(InboundPayload::StreamStarted)?,
            "stream.ended" => InboundPayload::StreamEnded,
            "error" => serde_json::from_value(payload).map(InboundPayload::ServerError)?,
            "pong" => serde_json::from_value(payload).map(InboundPayload::Pong)?,
            other => InboundPayload::Unrecognized {
                message_type: other.to_string(),
            },
        };
        Ok(decoded)
    }
}

// =============================================================================
// Inbound payload types
// =============================================================================

/// Typed view of an inbound message payload
#[derive(Debug, Clone)]
pub enum InboundPayload {
    PositionChanged(PositionPayload),
    TrackChanged(TrackPayload),
    StatusChanged(PlaybackStatus),
    VolumeChanged(VolumePayload),
    QueueAdded(TrackPayload),
    QueueRemoved(IndexPayload),
    QueueAdvanced,
    SettingsSync(SyncedSettings),
    StreamStarted(StreamStartedPayload),
    StreamEnded,
    ServerError(ServerErrorPayload),
    Pong(PongPayload),
    /// Type not known to this client version
    Unrecognized { message_type: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionPayload {
    pub position_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPayload {
    pub track: QueueTrack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPayload {
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumePayload {
    pub volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamStartedPayload {
    pub track_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongPayload {
    pub server_time: i64,
}

/// Multi-field playback status snapshot from the server
///
/// One status message batches several independent state changes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlaybackStatus {
    pub is_playing: bool,
    pub position_ms: u64,
    pub volume: f32,
    pub is_muted: bool,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

/// Repeat mode options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Queue,
}

/// Minimal track info carried in queue and playback messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
}

/// Settings that are synced across devices
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SyncedSettings {
    pub crossfade_enabled: Option<bool>,
    pub crossfade_duration: Option<f32>,
    pub gapless_enabled: Option<bool>,
    pub normalize_volume: Option<bool>,
}

/// Payload of a protocol-level error message
///
/// `context` tags which state slice the error belongs to; unrecognized
/// tags fall back to process-wide logging in the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerErrorPayload {
    pub context: String,
    pub code: String,
    pub message: String,
}

impl ServerErrorPayload {
    pub fn new(
        context: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_round_trip() {
        let msg = Message::play("track-123", 45000);
        let frame = msg.to_frame().unwrap();
        assert!(frame.contains("playback.play"));
        assert!(frame.contains("track-123"));

        let parsed = Message::from_frame(&frame).unwrap();
        assert_eq!(parsed.message_type, "playback.play");
        assert_eq!(parsed.correlation_id, msg.correlation_id);
        assert_eq!(parsed.priority, Priority::High);
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            MessageKind::classify("playback.play"),
            MessageKind::Continuous
        );
        assert_eq!(
            MessageKind::classify("stream.start"),
            MessageKind::Continuous
        );
        assert_eq!(MessageKind::classify("playback.stop"), MessageKind::Terminal);
        assert_eq!(
            MessageKind::classify("playback.pause"),
            MessageKind::Terminal
        );
        assert_eq!(MessageKind::classify("playback.seek"), MessageKind::Neutral);
        assert_eq!(MessageKind::classify("heartbeat"), MessageKind::Neutral);
    }

    #[test]
    fn test_decode_position() {
        let msg = Message::new("playback.position", json!({ "position_ms": 1234 }));
        let decoded = msg.decode().unwrap();
        assert!(matches!(
            decoded,
            InboundPayload::PositionChanged(PositionPayload { position_ms: 1234 })
        ));
    }

    #[test]
    fn test_decode_status_batches_fields() {
        let msg = Message::new(
            "playback.status",
            json!({
                "is_playing": true,
                "position_ms": 500,
                "volume": 0.8,
                "is_muted": false,
                "shuffle": true,
                "repeat": "queue"
            }),
        );
        match msg.decode().unwrap() {
            InboundPayload::StatusChanged(status) => {
                assert!(status.is_playing);
                assert_eq!(status.position_ms, 500);
                assert_eq!(status.repeat, RepeatMode::Queue);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_type_is_unrecognized() {
        let msg = Message::new("lyrics.update", json!({ "anything": true }));
        match msg.decode().unwrap() {
            InboundPayload::Unrecognized { message_type } => {
                assert_eq!(message_type, "lyrics.update");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed_known_type_is_error() {
        let msg = Message::new("playback.position", json!({ "position_ms": "nope" }));
        assert!(msg.decode().is_err());
    }

    #[test]
    fn test_queue_and_volume_constructors() {
        let track = QueueTrack {
            id: "t1".to_string(),
            title: "Song".to_string(),
            artist: "Band".to_string(),
            duration_ms: 200_000,
        };

        let add = Message::queue_add(&track);
        assert_eq!(add.message_type, "queue.add");
        assert_eq!(add.payload["track"]["id"], "t1");

        let remove = Message::queue_remove(3);
        assert_eq!(remove.message_type, "queue.remove");
        assert_eq!(remove.payload["index"], 3);

        let volume = Message::set_volume(0.4);
        assert_eq!(volume.message_type, "playback.volume");
        assert_eq!(volume.payload["volume"].as_f64().map(|v| v as f32), Some(0.4));

        // None of these touch the resume slot
        assert_eq!(add.kind(), MessageKind::Neutral);
        assert_eq!(remove.kind(), MessageKind::Neutral);
        assert_eq!(volume.kind(), MessageKind::Neutral);
    }

    #[test]
    fn test_heartbeat_is_low_priority_and_neutral() {
        let beat = Message::heartbeat();
        assert_eq!(beat.message_type, "heartbeat");
        assert_eq!(beat.priority, Priority::Low);
        assert_eq!(beat.kind(), MessageKind::Neutral);

        let frame = beat.to_frame().unwrap();
        let parsed = Message::from_frame(&frame).unwrap();
        assert_eq!(parsed.priority, Priority::Low);
    }

    #[test]
    fn test_priority_serialization() {
        assert_eq!(serde_json::to_string(&Priority::Low).unwrap(), "\"low\"");
        assert_eq!(
            serde_json::to_string(&Priority::Critical).unwrap(),
            "\"critical\""
        );
    }

    #[test]
    fn test_server_error_payload() {
        let payload = ServerErrorPayload::new("player", "STREAM_FAILED", "decoder gave up");
        let msg = Message::new("error", serde_json::to_value(&payload).unwrap());
        match msg.decode().unwrap() {
            InboundPayload::ServerError(err) => {
                assert_eq!(err.context, "player");
                assert_eq!(err.code, "STREAM_FAILED");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
