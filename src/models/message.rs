use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single chat message. Immutable once created except for the two
/// independent flags: `is_read` (flipped by the receiver) and
/// `is_resolved` (flipped by a bulk conversation-resolve).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub order_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub text: String,
    pub is_read: bool,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The conversation partner from `user_id`'s point of view.
    pub fn partner_of(&self, user_id: Uuid) -> Uuid {
        if self.sender_id == user_id {
            self.receiver_id
        } else {
            self.sender_id
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub order_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub text: String,
}
