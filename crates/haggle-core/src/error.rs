use thiserror::Error;

/// Failure taxonomy for the synchronization core.
///
/// Transport failures are retryable; validation failures are not and are
/// surfaced to the caller before any network round trip. A confirmed message
/// that has no matching pending entry is not an error at all - it is simply
/// appended during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl ChatError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Transport(_))
    }
}
