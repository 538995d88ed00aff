pub mod inbox;
pub mod reconcile;
pub mod thread_store;

pub use inbox::{Inbox, InboxView};
pub use reconcile::Reconciliation;
pub use thread_store::{OptimisticEntry, ThreadState, ThreadStore, ThreadView};
