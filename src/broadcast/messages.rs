use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message types for WebSocket communication (server to client only; clients
/// never drive state over the socket)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Snapshot,
    SeatUpdate,
    AuditEvent,
}

/// Metadata for WebSocket messages. `seq` is per channel and gapless, so a
/// client can detect that it missed a delta and ask for a fresh snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessageMeta {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
}

/// Base structure for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    pub meta: WsMessageMeta,
}

impl WsMessage {
    pub fn new(message_type: MessageType, payload: serde_json::Value, seq: u64) -> Self {
        Self {
            message_type,
            payload,
            meta: WsMessageMeta {
                seq,
                timestamp: Utc::now(),
            },
        }
    }

    /// Full-state snapshot, stamped with the sequence the subscription joined
    /// at so deltas already in flight can be deduplicated by the client.
    pub fn snapshot(payload: serde_json::Value, joined_seq: u64) -> Self {
        Self::new(MessageType::Snapshot, payload, joined_seq)
    }

    pub fn to_json(&self) -> String {
        // Serialization of a value we just built cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&MessageType::SeatUpdate).unwrap(),
            "\"SEAT_UPDATE\""
        );
        assert_eq!(
            serde_json::to_string(&MessageType::Snapshot).unwrap(),
            "\"SNAPSHOT\""
        );
        assert_eq!(
            serde_json::to_string(&MessageType::AuditEvent).unwrap(),
            "\"AUDIT_EVENT\""
        );
    }

    #[test]
    fn test_message_envelope_shape() {
        let msg = WsMessage::new(MessageType::SeatUpdate, json!({"seats": []}), 7);
        let value: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(value["type"], "SEAT_UPDATE");
        assert_eq!(value["meta"]["seq"], 7);
        assert!(value["meta"]["timestamp"].is_string());
    }
}
