use std::collections::HashMap;

use crate::api::Page;
use crate::error::ChatError;
use crate::models::{ConversationSummary, Message};

/// The inbox: conversation summaries keyed by id, ordered by recency on read.
///
/// Holds a derived projection only - it never mutates Message data, it reacts
/// to thread store mutations and push events. A manual refresh and a
/// push-driven update may race; last-write-wins on `last_activity` resolves
/// that, never arrival order.
#[derive(Debug, Default)]
pub struct Inbox {
    summaries: HashMap<i64, ConversationSummary>,
    pub total: u64,
    pub loading: bool,
    pub error: Option<ChatError>,
}

/// Read-only snapshot of the inbox handed to the UI
#[derive(Debug, Clone, Default)]
pub struct InboxView {
    /// Ordered by last activity, most recent first
    pub conversations: Vec<ConversationSummary>,
    pub total: u64,
    pub loading: bool,
    pub error: Option<ChatError>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self, conversation_id: i64) -> Option<&ConversationSummary> {
        self.summaries.get(&conversation_id)
    }

    pub fn set_error(&mut self, error: ChatError) {
        self.loading = false;
        self.error = Some(error);
    }

    pub fn clear_error(&mut self) -> bool {
        self.error.take().is_some()
    }

    /// Merge a fetched page of summaries. A fetched summary only overwrites a
    /// known one when it is at least as recent; a stale fetch can still
    /// backfill the participant field of a push-discovered conversation.
    pub fn merge_page(&mut self, page: Page<ConversationSummary>) {
        self.total = page.total;
        self.loading = false;
        self.error = None;

        for incoming in page.items {
            match self.summaries.get_mut(&incoming.conversation_id) {
                Some(existing) if existing.last_activity > incoming.last_activity => {
                    if existing.participant.is_empty() {
                        existing.participant = incoming.participant;
                    }
                    tracing::debug!(
                        conversation_id = existing.conversation_id,
                        "kept newer summary over stale fetch"
                    );
                }
                _ => {
                    self.summaries.insert(incoming.conversation_id, incoming);
                }
            }
        }
    }

    /// React to a message arrival (send, reconcile or push ingest). Unknown
    /// conversation ids are treated as newly created.
    pub fn apply_message(&mut self, message: &Message, from_self: bool, is_open: bool) {
        let summary = self
            .summaries
            .entry(message.conversation_id)
            .or_insert_with(|| ConversationSummary::from_message(message));

        if message.created_at >= summary.last_activity {
            summary.last_message = message.body.clone();
            summary.last_sender_id = message.sender_id;
            summary.last_activity = message.created_at;
        }
        if from_self {
            // Replying in a conversation implies having read it
            summary.unread = false;
        } else if !is_open {
            summary.unread = true;
        }
    }

    /// Returns true when the flag actually changed
    pub fn mark_read(&mut self, conversation_id: i64) -> bool {
        match self.summaries.get_mut(&conversation_id) {
            Some(summary) if summary.unread => {
                summary.unread = false;
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> InboxView {
        let mut conversations: Vec<ConversationSummary> = self.summaries.values().cloned().collect();
        // Ordering is always re-derived by recency, not by fetch order
        conversations.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then(b.conversation_id.cmp(&a.conversation_id))
        });
        InboxView {
            conversations,
            total: self.total,
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryState, MessageId};

    fn summary(conversation_id: i64, last_message: &str, last_activity: u64) -> ConversationSummary {
        ConversationSummary {
            conversation_id,
            participant: format!("user {conversation_id}"),
            last_message: last_message.to_string(),
            last_sender_id: 77,
            last_activity,
            unread: false,
        }
    }

    fn message(conversation_id: i64, body: &str, created_at: u64, sender_id: i64) -> Message {
        Message {
            id: MessageId::Server(created_at as i64),
            conversation_id,
            sender_id,
            body: body.to_string(),
            created_at,
            delivery: DeliveryState::Confirmed,
        }
    }

    fn fetched(items: Vec<ConversationSummary>) -> Page<ConversationSummary> {
        let total = items.len() as u64;
        Page { items, total, page: 1, page_size: 20 }
    }

    #[test]
    fn test_snapshot_orders_by_recency() {
        let mut inbox = Inbox::new();
        inbox.merge_page(fetched(vec![
            summary(1, "a", 100),
            summary(2, "b", 300),
            summary(3, "c", 200),
        ]));
        let ids: Vec<i64> = inbox.snapshot().conversations.iter().map(|c| c.conversation_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_stale_refresh_does_not_overwrite_push_update() {
        let mut inbox = Inbox::new();
        inbox.merge_page(fetched(vec![summary(7, "hi", 100)]));

        // Push delivers a newer message while a manual refresh is in flight
        inbox.apply_message(&message(7, "there", 200, 77), false, false);
        // The refresh resolves late, carrying pre-push data
        inbox.merge_page(fetched(vec![summary(7, "hi", 100)]));

        let view = inbox.snapshot();
        assert_eq!(view.conversations[0].last_message, "there");
        assert_eq!(view.conversations[0].last_activity, 200);
        assert_eq!(view.conversations[0].conversation_id, 7, "stays at the top");
    }

    #[test]
    fn test_newer_refresh_replaces_summary() {
        let mut inbox = Inbox::new();
        inbox.merge_page(fetched(vec![summary(7, "old", 100)]));
        inbox.merge_page(fetched(vec![summary(7, "new", 400)]));
        assert_eq!(inbox.summary(7).unwrap().last_message, "new");
    }

    #[test]
    fn test_unknown_conversation_is_created_from_message() {
        let mut inbox = Inbox::new();
        inbox.apply_message(&message(9, "first contact", 500, 77), false, false);

        let created = inbox.summary(9).unwrap();
        assert_eq!(created.last_message, "first contact");
        assert!(created.unread);
        assert!(created.participant.is_empty());

        // A later (stale) fetch backfills the participant without regressing recency
        inbox.merge_page(fetched(vec![summary(9, "first contact", 400)]));
        let backfilled = inbox.summary(9).unwrap();
        assert_eq!(backfilled.participant, "user 9");
        assert_eq!(backfilled.last_activity, 500);
    }

    #[test]
    fn test_unread_semantics() {
        let mut inbox = Inbox::new();
        inbox.apply_message(&message(7, "hello", 100, 77), false, false);
        assert!(inbox.summary(7).unwrap().unread);

        assert!(inbox.mark_read(7));
        assert!(!inbox.mark_read(7), "second mark_read changes nothing");

        // Message arriving in the open conversation does not flag unread
        inbox.apply_message(&message(7, "more", 200, 77), false, true);
        assert!(!inbox.summary(7).unwrap().unread);

        // Own message clears an unread flag
        inbox.apply_message(&message(7, "ping", 300, 77), false, false);
        assert!(inbox.summary(7).unwrap().unread);
        inbox.apply_message(&message(7, "reply", 400, 42), true, false);
        assert!(!inbox.summary(7).unwrap().unread);
    }

    #[test]
    fn test_error_bookkeeping() {
        let mut inbox = Inbox::new();
        inbox.loading = true;
        inbox.set_error(ChatError::Transport("inbox down".into()));
        assert!(!inbox.loading);
        assert!(inbox.clear_error());
        assert!(!inbox.clear_error());
    }
}
