use crate::streaming::ConnectionState;

/// Change notification fanned out to subscribers after a store mutation.
///
/// Carries identities, not data: subscribers re-read the derived views, which
/// keeps every observer consistent with the single owned copy of the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    ThreadUpdated { conversation_id: i64 },
    InboxUpdated,
    ConnectionChanged(ConnectionState),
}
