use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Message identity.
///
/// A message carries its stable server id once the server has assigned one.
/// Before confirmation a locally-sent message carries a temporary local id
/// drawn from [`crate::ids::LocalIdAllocator`]. The two spaces never overlap:
/// server ids are positive, local ids are negative.
///
/// On the wire both are plain integers, so serde maps through `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MessageId {
    Server(i64),
    Local(i64),
}

impl From<i64> for MessageId {
    fn from(value: i64) -> Self {
        if value < 0 {
            MessageId::Local(value)
        } else {
            MessageId::Server(value)
        }
    }
}

impl From<MessageId> for i64 {
    fn from(id: MessageId) -> Self {
        match id {
            MessageId::Server(v) | MessageId::Local(v) => v,
        }
    }
}

impl Ord for MessageId {
    /// Tiebreak order inside a thread at equal timestamps: confirmed (server)
    /// messages sort before unconfirmed (local) ones, server ids ascending.
    /// Local ids are allocated downward (-1, -2, ...), so allocation order is
    /// reverse numeric order.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (MessageId::Server(a), MessageId::Server(b)) => a.cmp(b),
            (MessageId::Local(a), MessageId::Local(b)) => b.cmp(a),
            (MessageId::Server(_), MessageId::Local(_)) => Ordering::Less,
            (MessageId::Local(_), MessageId::Server(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for MessageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Delivery state of a message as seen by this client.
///
/// Wire messages never carry this field; anything the server hands us is
/// confirmed by definition, hence the `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    #[default]
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub body: String,
    /// Epoch milliseconds
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "is_confirmed")]
    pub delivery: DeliveryState,
}

fn is_confirmed(state: &DeliveryState) -> bool {
    *state == DeliveryState::Confirmed
}

impl Message {
    /// Build the pending placeholder shown before the server confirms a send.
    pub fn pending(conversation_id: i64, local_id: i64, sender_id: i64, body: String, now: u64) -> Self {
        Self {
            id: MessageId::Local(local_id),
            conversation_id,
            sender_id,
            body,
            created_at: now,
            delivery: DeliveryState::Pending,
        }
    }

    /// Total order within a thread: by timestamp, then id as tiebreak.
    pub fn sort_key(&self) -> (u64, MessageId) {
        (self.created_at, self.id)
    }

    pub fn is_pending(&self) -> bool {
        self.delivery == DeliveryState::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmed(id: i64, created_at: u64) -> Message {
        Message {
            id: MessageId::Server(id),
            conversation_id: 1,
            sender_id: 10,
            body: "m".to_string(),
            created_at,
            delivery: DeliveryState::Confirmed,
        }
    }

    #[test]
    fn test_order_by_timestamp_then_id() {
        let a = confirmed(5, 100);
        let b = confirmed(2, 200);
        let c = confirmed(9, 100);
        assert!(a.sort_key() < b.sort_key(), "earlier timestamp sorts first");
        assert!(a.sort_key() < c.sort_key(), "id breaks timestamp ties");
    }

    #[test]
    fn test_local_ids_sort_after_server_ids_at_equal_timestamp() {
        let server = MessageId::Server(900);
        let local = MessageId::Local(-1);
        assert!(server < local);
    }

    #[test]
    fn test_local_ids_sort_in_allocation_order() {
        // -1 was allocated before -2, so it sorts first
        assert!(MessageId::Local(-1) < MessageId::Local(-2));
    }

    #[test]
    fn test_message_id_deserializes_from_plain_integer() {
        let msg: Message = serde_json::from_str(
            r#"{"id": 900, "conversation_id": 7, "sender_id": 42, "body": "hi", "created_at": 1000}"#,
        )
        .unwrap();
        assert_eq!(msg.id, MessageId::Server(900));
        assert_eq!(msg.delivery, DeliveryState::Confirmed, "wire messages default to confirmed");

        let id: MessageId = serde_json::from_str("-3").unwrap();
        assert_eq!(id, MessageId::Local(-3));
    }

    #[test]
    fn test_message_id_serializes_as_plain_integer() {
        let json = serde_json::to_value(MessageId::Server(12)).unwrap();
        assert_eq!(json, serde_json::json!(12));
    }
}
