//! Resolves the relationship between a server-confirmed message and any
//! outstanding pending message in the same conversation.
//!
//! Push delivery plus independent request/response fetches is an
//! at-least-once, out-of-order delivery problem; dedup by server id plus the
//! claim policy below is the whole correctness story for the sender's own
//! echoed messages.

use crate::models::{DeliveryState, Message};

use super::thread_store::ThreadState;

/// How a confirmed message was folded into the thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Server id already present; nothing changed
    Duplicate,
    /// The confirmed message replaced a pending placeholder
    Claimed { local_id: i64 },
    /// No matching pending entry (other participant, or another session of
    /// the same user); plain ordered insert. Not an error.
    Appended,
}

/// Claim policy: a confirmed message claims the oldest pending entry whose
/// body matches and whose submission time does not exceed the confirmation
/// time - and only when the confirmed sender is the current user, so another
/// participant echoing identical text can never steal a pending entry.
pub fn reconcile(state: &mut ThreadState, mut message: Message, self_user_id: i64) -> Reconciliation {
    message.delivery = DeliveryState::Confirmed;

    if state.contains(message.id) {
        return Reconciliation::Duplicate;
    }

    if message.sender_id == self_user_id {
        // `pending` is kept in submission order, so the first match is the oldest
        let claim = state
            .pending
            .iter()
            .find(|entry| {
                entry.submitted_at <= message.created_at
                    && state.pending_body(entry.local_id) == Some(message.body.as_str())
            })
            .map(|entry| entry.local_id);

        if let Some(local_id) = claim {
            state.remove_pending(local_id);
            state.insert_sorted(message);
            return Reconciliation::Claimed { local_id };
        }
    }

    state.insert_sorted(message);
    Reconciliation::Appended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use crate::store::thread_store::OptimisticEntry;

    const ME: i64 = 42;
    const OTHER: i64 = 77;

    fn state_with_pending(entries: &[(i64, u64, &str)]) -> ThreadState {
        let mut state = ThreadState::default();
        for (local_id, submitted_at, body) in entries {
            state.insert_sorted(Message::pending(7, *local_id, ME, body.to_string(), *submitted_at));
            state.pending.push(OptimisticEntry {
                conversation_id: 7,
                local_id: *local_id,
                submitted_at: *submitted_at,
            });
        }
        state
    }

    fn confirmed(id: i64, created_at: u64, sender_id: i64, body: &str) -> Message {
        Message {
            id: MessageId::Server(id),
            conversation_id: 7,
            sender_id,
            body: body.to_string(),
            created_at,
            delivery: DeliveryState::Confirmed,
        }
    }

    #[test]
    fn test_claims_matching_pending_entry() {
        let mut state = state_with_pending(&[(-1, 100, "hi")]);
        let outcome = reconcile(&mut state, confirmed(900, 150, ME, "hi"), ME);
        assert_eq!(outcome, Reconciliation::Claimed { local_id: -1 });
        assert_eq!(state.messages().len(), 1, "replaced, never both kept");
        assert_eq!(state.messages()[0].id, MessageId::Server(900));
        assert_eq!(state.messages()[0].delivery, DeliveryState::Confirmed);
        assert!(state.pending_entries().is_empty());
    }

    #[test]
    fn test_claims_oldest_of_two_identical_bodies() {
        let mut state = state_with_pending(&[(-1, 100, "hi"), (-2, 120, "hi")]);
        let outcome = reconcile(&mut state, confirmed(900, 150, ME, "hi"), ME);
        assert_eq!(outcome, Reconciliation::Claimed { local_id: -1 });
        assert_eq!(state.pending_entries().len(), 1);
        assert_eq!(state.pending_entries()[0].local_id, -2);
    }

    #[test]
    fn test_other_sender_never_claims() {
        let mut state = state_with_pending(&[(-1, 100, "hi")]);
        let outcome = reconcile(&mut state, confirmed(900, 150, OTHER, "hi"), ME);
        assert_eq!(outcome, Reconciliation::Appended);
        assert_eq!(state.messages().len(), 2, "pending entry stays for its own confirmation");
        assert_eq!(state.pending_entries().len(), 1);
    }

    #[test]
    fn test_submission_after_confirmation_is_not_claimed() {
        let mut state = state_with_pending(&[(-1, 200, "hi")]);
        let outcome = reconcile(&mut state, confirmed(900, 150, ME, "hi"), ME);
        assert_eq!(outcome, Reconciliation::Appended);
        assert_eq!(state.pending_entries().len(), 1);
    }

    #[test]
    fn test_body_mismatch_is_appended() {
        let mut state = state_with_pending(&[(-1, 100, "hi")]);
        let outcome = reconcile(&mut state, confirmed(900, 150, ME, "hello"), ME);
        assert_eq!(outcome, Reconciliation::Appended);
        assert_eq!(state.messages().len(), 2);
    }

    #[test]
    fn test_duplicate_server_id_is_dropped() {
        let mut state = ThreadState::default();
        assert_eq!(reconcile(&mut state, confirmed(900, 150, ME, "hi"), ME), Reconciliation::Appended);
        assert_eq!(reconcile(&mut state, confirmed(900, 150, ME, "hi"), ME), Reconciliation::Duplicate);
        assert_eq!(state.messages().len(), 1);
    }
}
