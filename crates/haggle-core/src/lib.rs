pub mod api;
pub mod constants;
pub mod error;
pub mod events;
pub mod ids;
pub mod models;
pub mod runtime;
pub mod store;
pub mod streaming;
pub mod tracing_setup;

pub use api::{ChatApi, Identity, Page, PushStream, PushTransport};
pub use error::ChatError;
pub use events::ChatEvent;
pub use ids::LocalIdAllocator;
pub use models::{ConversationSummary, DeliveryState, Message, MessageId};
pub use runtime::ChatClient;
pub use store::{InboxView, Reconciliation, ThreadView};
pub use streaming::{ConnectionManager, ConnectionState, PushEvent};
