pub mod connection;
pub mod types;

pub use connection::ConnectionManager;
pub use types::{ConnectionState, PushEvent};
