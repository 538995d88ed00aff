//! Contracts consumed from external collaborators.
//!
//! The request client, push transport and identity provider are owned by the
//! surrounding application; the synchronization core only sees these traits.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::models::{ConversationSummary, Message};
use crate::streaming::PushEvent;

/// One page of a paginated fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Request/response client for conversation and inbox data
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn fetch_conversation(
        &self,
        conversation_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Message>, ChatError>;

    async fn send_message(&self, conversation_id: i64, body: &str) -> Result<Message, ChatError>;

    async fn fetch_inbox(&self, page: u32, page_size: u32) -> Result<Page<ConversationSummary>, ChatError>;
}

/// Ordered, at-least-once stream of push events. End of stream means the
/// transport dropped; the connection manager decides whether to reconnect.
pub type PushStream = BoxStream<'static, PushEvent>;

/// Persistent push connection factory. `connect` performs the transport
/// handshake and resolves once events can flow.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self) -> Result<PushStream, ChatError>;
}

/// Supplies the current user's id, used to tell "my pending message" from
/// "other participant's message" during reconciliation.
pub trait Identity: Send + Sync {
    fn user_id(&self) -> i64;
}
