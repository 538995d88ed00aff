//! Application-wide constants
//!
//! Centralized location for configuration values used across multiple modules.

/// Default number of messages per conversation page
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// Default number of conversation summaries per inbox page
pub const DEFAULT_INBOX_PAGE_SIZE: u32 = 20;

/// Maximum accepted message body length, in characters
pub const MAX_MESSAGE_LEN: usize = 2000;

// Reconnection backoff bounds
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// Capacity of the push event channel between the connection manager
/// and the runtime
pub const PUSH_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the change-notification broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
