use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Message;

/// Server-to-client frames on the chat socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    NewMessage { message: MessagePush },
    Pong,
    Error { message: String },
}

/// Payload of a `new_message` push. A trimmed view of the persisted
/// message with the sender's username resolved for display.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePush {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: String,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub sender_username: String,
}

impl MessagePush {
    pub fn from_message(message: &Message, sender_username: &str) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            text: message.text.clone(),
            order_id: message.order_id,
            created_at: message.created_at,
            sender_username: sender_username.to_string(),
        }
    }
}
