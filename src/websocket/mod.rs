pub mod connection_manager;
pub mod events;

pub use connection_manager::{ConnectionId, ConnectionManager};
pub use events::{ChatEvent, MessagePush};
