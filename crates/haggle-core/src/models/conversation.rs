use serde::{Deserialize, Serialize};

use super::message::Message;

/// Inbox-level summary of one conversation.
///
/// Discovered via inbox fetch or a push event referencing an unseen
/// conversation id; updated on every message arrival; never deleted
/// client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: i64,
    /// Display summary of the other participant(s)
    #[serde(default)]
    pub participant: String,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub last_sender_id: i64,
    /// Epoch milliseconds of the most recent activity
    pub last_activity: u64,
    #[serde(default)]
    pub unread: bool,
}

impl ConversationSummary {
    /// Summary for a conversation first seen through a message rather than an
    /// inbox fetch. The participant field stays empty until a fetch backfills it.
    pub fn from_message(message: &Message) -> Self {
        Self {
            conversation_id: message.conversation_id,
            participant: String::new(),
            last_message: message.body.clone(),
            last_sender_id: message.sender_id,
            last_activity: message.created_at,
            unread: false,
        }
    }
}
