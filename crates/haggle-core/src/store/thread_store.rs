use std::collections::HashMap;

use crate::api::Page;
use crate::error::ChatError;
use crate::models::{Message, MessageId};

use super::reconcile::{reconcile, Reconciliation};

/// Association between a temporary local id and the send operation in flight.
/// Destroyed when reconciled (success) or rolled back (failure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticEntry {
    pub conversation_id: i64,
    pub local_id: i64,
    /// Epoch milliseconds at submission
    pub submitted_at: u64,
}

/// Ordered message sequence of one conversation plus its paging bookkeeping.
///
/// Invariant: `messages` is sorted by `(created_at, id)` and contains no two
/// messages with the same server id. `pending` is kept in submission order,
/// which is what makes "oldest pending match" a plain front-to-back scan.
#[derive(Debug, Clone, Default)]
pub struct ThreadState {
    pub(crate) messages: Vec<Message>,
    pub(crate) pending: Vec<OptimisticEntry>,
    /// Total confirmed messages the server knows about
    pub total: u64,
    /// Highest page fetched so far (0 = nothing fetched yet)
    pub pages_fetched: u32,
    pub page_size: u32,
    pub loading: bool,
    pub error: Option<ChatError>,
}

impl ThreadState {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn pending_entries(&self) -> &[OptimisticEntry] {
        &self.pending
    }

    /// Whether older pages remain unfetched on the server
    pub fn has_older(&self) -> bool {
        (self.pages_fetched as u64).saturating_mul(self.page_size as u64) < self.total
    }

    pub(crate) fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    pub(crate) fn pending_body(&self, local_id: i64) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.id == MessageId::Local(local_id))
            .map(|m| m.body.as_str())
    }

    /// Value-based ordered insert. An id collision overwrites in place, which
    /// keeps every merge idempotent.
    pub(crate) fn insert_sorted(&mut self, message: Message) {
        match self
            .messages
            .binary_search_by(|m| m.sort_key().cmp(&message.sort_key()))
        {
            Ok(pos) => self.messages[pos] = message,
            Err(pos) => self.messages.insert(pos, message),
        }
    }

    pub(crate) fn remove_pending(&mut self, local_id: i64) -> bool {
        let had_entry = self.pending.iter().any(|e| e.local_id == local_id);
        self.pending.retain(|e| e.local_id != local_id);
        self.messages.retain(|m| m.id != MessageId::Local(local_id));
        had_entry
    }
}

/// Per-conversation message sequences - the single owner of all Message data.
///
/// All mutation flows through the entry points below; callers only ever see
/// snapshots. Merge order is value-based, so a late page fetch arriving after
/// navigation-away still merges correctly.
#[derive(Debug, Default)]
pub struct ThreadStore {
    threads: HashMap<i64, ThreadState>,
}

/// Read-only snapshot of one thread handed to the UI
#[derive(Debug, Clone, Default)]
pub struct ThreadView {
    pub conversation_id: i64,
    pub messages: Vec<Message>,
    pub total: u64,
    pub pages_fetched: u32,
    pub has_older: bool,
    pub loading: bool,
    pub error: Option<ChatError>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, conversation_id: i64) -> Option<&ThreadState> {
        self.threads.get(&conversation_id)
    }

    fn state_mut(&mut self, conversation_id: i64) -> &mut ThreadState {
        self.threads.entry(conversation_id).or_default()
    }

    pub fn set_loading(&mut self, conversation_id: i64, loading: bool) {
        self.state_mut(conversation_id).loading = loading;
    }

    pub fn set_error(&mut self, conversation_id: i64, error: ChatError) {
        let state = self.state_mut(conversation_id);
        state.loading = false;
        state.error = Some(error);
    }

    /// Returns true when an error flag was actually cleared
    pub fn clear_error(&mut self, conversation_id: i64) -> bool {
        match self.threads.get_mut(&conversation_id) {
            Some(state) => state.error.take().is_some(),
            None => false,
        }
    }

    /// Merge one fetched page into the thread.
    ///
    /// Page 1 is a refresh of the recent window: previously fetched confirmed
    /// messages are replaced by the fresh window, pending optimistic entries
    /// survive untouched. Pages > 1 only add older messages; anything already
    /// known (earlier page, reconciliation, push) is left in place.
    pub fn merge_page(&mut self, conversation_id: i64, page: Page<Message>) {
        let state = self.state_mut(conversation_id);

        if page.page <= 1 {
            // Refresh of the recent window. Confirmed rows newer than the
            // fetched snapshot (a send or push confirmed while this fetch was
            // in flight) cannot be deleted-upstream rows; they survive the
            // replacement along with every pending entry.
            let newest_fetched = page.items.iter().map(|m| m.sort_key()).max();
            state.messages.retain(|m| {
                m.is_pending() || newest_fetched.map_or(true, |key| m.sort_key() > key)
            });
            state.pages_fetched = 1;
        } else {
            state.pages_fetched = state.pages_fetched.max(page.page);
        }
        state.total = page.total;
        state.page_size = page.page_size;
        state.loading = false;
        state.error = None;

        let merged = page.items.len();
        for mut message in page.items {
            message.delivery = crate::models::DeliveryState::Confirmed;
            if !state.contains(message.id) {
                state.insert_sorted(message);
            }
        }
        tracing::debug!(
            conversation_id,
            page = page.page,
            merged,
            thread_len = state.messages.len(),
            "merged conversation page"
        );
    }

    /// Insert a pending message at local time so the UI reflects the send
    /// before any network round trip completes.
    pub fn append_optimistic(
        &mut self,
        conversation_id: i64,
        local_id: i64,
        sender_id: i64,
        body: String,
        now: u64,
    ) {
        let state = self.state_mut(conversation_id);
        state.insert_sorted(Message::pending(conversation_id, local_id, sender_id, body, now));
        state.pending.push(OptimisticEntry {
            conversation_id,
            local_id,
            submitted_at: now,
        });
        tracing::debug!(conversation_id, local_id, "appended optimistic message");
    }

    /// Roll back a failed send. No-op if the entry was already reconciled.
    pub fn remove_optimistic(&mut self, conversation_id: i64, local_id: i64) -> bool {
        match self.threads.get_mut(&conversation_id) {
            Some(state) => {
                let removed = state.remove_pending(local_id);
                if removed {
                    tracing::debug!(conversation_id, local_id, "rolled back optimistic message");
                }
                removed
            }
            None => false,
        }
    }

    /// Ingest a server-confirmed message (send response or push delivery) and
    /// resolve it against any outstanding pending entry.
    pub fn ingest_confirmed(&mut self, message: Message, self_user_id: i64) -> Reconciliation {
        let conversation_id = message.conversation_id;
        let state = self.state_mut(conversation_id);
        let outcome = reconcile(state, message, self_user_id);
        match &outcome {
            Reconciliation::Duplicate => {
                tracing::debug!(conversation_id, "dropped duplicate confirmed message");
            }
            Reconciliation::Claimed { local_id } => {
                state.total = state.total.saturating_add(1);
                tracing::debug!(conversation_id, local_id, "confirmed message claimed pending entry");
            }
            Reconciliation::Appended => {
                state.total = state.total.saturating_add(1);
                tracing::debug!(conversation_id, "appended confirmed message without pending match");
            }
        }
        outcome
    }

    pub fn snapshot(&self, conversation_id: i64) -> ThreadView {
        match self.threads.get(&conversation_id) {
            Some(state) => ThreadView {
                conversation_id,
                messages: state.messages.clone(),
                total: state.total,
                pages_fetched: state.pages_fetched,
                has_older: state.has_older(),
                loading: state.loading,
                error: state.error.clone(),
            },
            None => ThreadView {
                conversation_id,
                ..ThreadView::default()
            },
        }
    }
}
