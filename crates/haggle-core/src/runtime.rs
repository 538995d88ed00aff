use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use crate::api::{ChatApi, Identity, PushTransport};
use crate::constants::{DEFAULT_INBOX_PAGE_SIZE, DEFAULT_PAGE_SIZE, EVENT_CHANNEL_CAPACITY, MAX_MESSAGE_LEN, PUSH_CHANNEL_CAPACITY};
use crate::error::ChatError;
use crate::events::ChatEvent;
use crate::ids::LocalIdAllocator;
use crate::store::{Inbox, InboxView, Reconciliation, ThreadStore, ThreadView};
use crate::streaming::{ConnectionManager, ConnectionState, PushEvent};

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Front door of the synchronization core.
///
/// Owns the thread store, the inbox and the connection manager; every UI
/// intent lands here and every store mutation leaves here as a [`ChatEvent`]
/// on the broadcast channel. The stores themselves never reach for the
/// network - this is the only place requests are issued, which is also where
/// concurrent fetches for the same (conversation, page) are coalesced.
pub struct ChatClient {
    api: Arc<dyn ChatApi>,
    identity: Arc<dyn Identity>,
    threads: Mutex<ThreadStore>,
    inbox: Mutex<Inbox>,
    ids: LocalIdAllocator,
    connection: ConnectionManager,
    push_rx: Mutex<Option<mpsc::Receiver<PushEvent>>>,
    events_tx: broadcast::Sender<ChatEvent>,
    in_flight_pages: Mutex<HashSet<(i64, u32)>>,
    open_conversation: Mutex<Option<i64>>,
}

impl ChatClient {
    /// Must be called from within a tokio runtime: construction spawns the
    /// task that forwards connectivity transitions to event subscribers.
    pub fn new(
        api: Arc<dyn ChatApi>,
        identity: Arc<dyn Identity>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let (push_tx, push_rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let connection = ConnectionManager::new(transport, push_tx);

        // Forward connectivity transitions to subscribers
        let mut state_rx = connection.state();
        let forward_tx = events_tx.clone();
        tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let state = *state_rx.borrow();
                let _ = forward_tx.send(ChatEvent::ConnectionChanged(state));
            }
        });

        Self {
            api,
            identity,
            threads: Mutex::new(ThreadStore::new()),
            inbox: Mutex::new(Inbox::new()),
            ids: LocalIdAllocator::new(),
            connection,
            push_rx: Mutex::new(Some(push_rx)),
            events_tx,
            in_flight_pages: Mutex::new(HashSet::new()),
            open_conversation: Mutex::new(None),
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events_tx.subscribe()
    }

    fn notify(&self, event: ChatEvent) {
        let _ = self.events_tx.send(event);
    }

    // --- connectivity intents ---

    pub fn connect(&self) {
        self.connection.connect();
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.current_state()
    }

    /// Take ownership of the inbound push event receiver. The embedding
    /// application either drives it manually through
    /// [`ChatClient::process_push_event`] or hands the client to
    /// [`ChatClient::run_push_loop`].
    pub fn take_push_rx(&self) -> Option<mpsc::Receiver<PushEvent>> {
        self.push_rx.lock().take()
    }

    /// Drive push delivery until the connection manager goes away.
    pub async fn run_push_loop(self: Arc<Self>) -> anyhow::Result<()> {
        let mut rx = self
            .take_push_rx()
            .context("push receiver already taken")?;
        while let Some(event) = rx.recv().await {
            self.process_push_event(event);
        }
        Ok(())
    }

    /// Route one push event through the thread store, then the inbox.
    /// Re-delivery of an already-known server id is a complete no-op.
    pub fn process_push_event(&self, event: PushEvent) {
        match event {
            PushEvent::Message(message) => {
                let conversation_id = message.conversation_id;
                let user_id = self.identity.user_id();
                let outcome = self.threads.lock().ingest_confirmed(message.clone(), user_id);
                if outcome == Reconciliation::Duplicate {
                    return;
                }
                let from_self = message.sender_id == user_id;
                let is_open = *self.open_conversation.lock() == Some(conversation_id);
                self.inbox.lock().apply_message(&message, from_self, is_open);
                self.notify(ChatEvent::ThreadUpdated { conversation_id });
                self.notify(ChatEvent::InboxUpdated);
            }
        }
    }

    // --- conversation intents ---

    /// Open a conversation: mark it read and refresh its recent window.
    pub async fn open_conversation(&self, conversation_id: i64) -> Result<(), ChatError> {
        *self.open_conversation.lock() = Some(conversation_id);
        if self.inbox.lock().mark_read(conversation_id) {
            self.notify(ChatEvent::InboxUpdated);
        }
        self.load_page(conversation_id, 1, DEFAULT_PAGE_SIZE).await.map(|_| ())
    }

    /// Navigation-away: stop treating the conversation as open. In-flight
    /// fetches are not cancelled; their results still merge correctly.
    pub fn close_conversation(&self) {
        *self.open_conversation.lock() = None;
    }

    /// Fetch the next older page. Returns false when the full history is
    /// already present or the fetch was coalesced into one already in flight.
    pub async fn load_older_messages(&self, conversation_id: i64) -> Result<bool, ChatError> {
        let (next_page, page_size) = {
            let store = self.threads.lock();
            match store.state(conversation_id) {
                Some(state) if state.pages_fetched > 0 => {
                    if !state.has_older() {
                        return Ok(false);
                    }
                    (state.pages_fetched + 1, state.page_size.max(1))
                }
                _ => (1, DEFAULT_PAGE_SIZE),
            }
        };
        self.load_page(conversation_id, next_page, page_size).await
    }

    async fn load_page(&self, conversation_id: i64, page: u32, page_size: u32) -> Result<bool, ChatError> {
        if !self.in_flight_pages.lock().insert((conversation_id, page)) {
            tracing::debug!(conversation_id, page, "page fetch already in flight, coalescing");
            return Ok(false);
        }
        self.threads.lock().set_loading(conversation_id, true);
        self.notify(ChatEvent::ThreadUpdated { conversation_id });

        let result = self.api.fetch_conversation(conversation_id, page, page_size).await;
        self.in_flight_pages.lock().remove(&(conversation_id, page));

        match result {
            Ok(fetched) => {
                self.threads.lock().merge_page(conversation_id, fetched);
                self.notify(ChatEvent::ThreadUpdated { conversation_id });
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(conversation_id, page, error = %e, "page fetch failed");
                self.threads.lock().set_error(conversation_id, e.clone());
                self.notify(ChatEvent::ThreadUpdated { conversation_id });
                Err(e)
            }
        }
    }

    /// Send a message: pending placeholder now, reconcile or roll back when
    /// the server answers.
    pub async fn send_message(&self, conversation_id: i64, body: &str) -> Result<(), ChatError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ChatError::Validation("message body is empty".into()));
        }
        if body.chars().count() > MAX_MESSAGE_LEN {
            return Err(ChatError::Validation(format!(
                "message body exceeds {MAX_MESSAGE_LEN} characters"
            )));
        }

        let user_id = self.identity.user_id();
        let local_id = self.ids.allocate();
        self.threads.lock().append_optimistic(
            conversation_id,
            local_id,
            user_id,
            body.to_string(),
            now_millis(),
        );
        self.notify(ChatEvent::ThreadUpdated { conversation_id });

        match self.api.send_message(conversation_id, body).await {
            Ok(confirmed) => {
                let outcome = self.threads.lock().ingest_confirmed(confirmed.clone(), user_id);
                if outcome != Reconciliation::Duplicate {
                    let is_open = *self.open_conversation.lock() == Some(conversation_id);
                    self.inbox.lock().apply_message(&confirmed, true, is_open);
                    self.notify(ChatEvent::ThreadUpdated { conversation_id });
                    self.notify(ChatEvent::InboxUpdated);
                }
                Ok(())
            }
            Err(e) => {
                // Retry is a fresh send with a new local id; this one is gone.
                let mut threads = self.threads.lock();
                threads.remove_optimistic(conversation_id, local_id);
                threads.set_error(conversation_id, e.clone());
                drop(threads);
                self.notify(ChatEvent::ThreadUpdated { conversation_id });
                Err(e)
            }
        }
    }

    // --- inbox intents ---

    pub async fn refresh_inbox(&self) -> Result<(), ChatError> {
        self.refresh_inbox_page(1, DEFAULT_INBOX_PAGE_SIZE).await
    }

    pub async fn refresh_inbox_page(&self, page: u32, page_size: u32) -> Result<(), ChatError> {
        {
            let mut inbox = self.inbox.lock();
            if inbox.loading {
                tracing::debug!("inbox refresh already in flight, coalescing");
                return Ok(());
            }
            inbox.loading = true;
        }
        self.notify(ChatEvent::InboxUpdated);

        match self.api.fetch_inbox(page, page_size).await {
            Ok(fetched) => {
                self.inbox.lock().merge_page(fetched);
                self.notify(ChatEvent::InboxUpdated);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "inbox refresh failed");
                self.inbox.lock().set_error(e.clone());
                self.notify(ChatEvent::InboxUpdated);
                Err(e)
            }
        }
    }

    // --- error dismissal ---

    /// Clears only the error flag, never message data
    pub fn dismiss_thread_error(&self, conversation_id: i64) {
        if self.threads.lock().clear_error(conversation_id) {
            self.notify(ChatEvent::ThreadUpdated { conversation_id });
        }
    }

    pub fn dismiss_inbox_error(&self) {
        if self.inbox.lock().clear_error() {
            self.notify(ChatEvent::InboxUpdated);
        }
    }

    // --- read-only derived views ---

    pub fn thread_view(&self, conversation_id: i64) -> ThreadView {
        self.threads.lock().snapshot(conversation_id)
    }

    pub fn inbox_view(&self) -> InboxView {
        self.inbox.lock().snapshot()
    }
}
