use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::models::Message;

/// Connectivity of the persistent push connection. Exactly one instance
/// process-wide, owned by the [`super::ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Server-initiated event delivered over the push connection.
///
/// Wire format: `{"type": "message", "payload": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum PushEvent {
    Message(Message),
}

impl PushEvent {
    /// Decode one event from its wire encoding. Intended for transport
    /// implementations that read newline-delimited JSON frames.
    pub fn from_json(raw: &str) -> Result<Self, ChatError> {
        serde_json::from_str(raw).map_err(|e| ChatError::Transport(format!("malformed push event: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryState, MessageId};

    #[test]
    fn test_push_event_decodes_message_envelope() {
        let raw = r#"{
            "type": "message",
            "payload": {"id": 900, "conversation_id": 7, "sender_id": 42, "body": "hi", "created_at": 1000}
        }"#;
        let event = PushEvent::from_json(raw).unwrap();
        let PushEvent::Message(msg) = event;
        assert_eq!(msg.id, MessageId::Server(900));
        assert_eq!(msg.conversation_id, 7);
        assert_eq!(msg.delivery, DeliveryState::Confirmed);
    }

    #[test]
    fn test_push_event_rejects_garbage() {
        let err = PushEvent::from_json("not json").unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
    }
}
