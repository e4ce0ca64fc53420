pub mod message;
pub mod order;
pub mod user;

pub use message::{Message, NewMessage};
pub use order::OrderParticipants;
pub use user::{User, UserRole};
