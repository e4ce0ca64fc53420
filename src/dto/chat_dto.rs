use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Message, User, UserRole};

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    /// One uniform bound on message text, applied at every entry point.
    #[validate(length(min = 1, max = 2000, message = "text must be 1..=2000 characters"))]
    pub text: String,
    pub order_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PaginationQuery {
    /// Clamp to `page >= 1`, `1 <= limit <= 100` with the endpoint's
    /// default page size.
    pub fn normalize(&self, default_limit: i64) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, 100);
        (page, limit)
    }
}

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub order_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SupportConnectQuery {
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub order_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub text: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub sender_username: String,
    pub receiver_username: String,
    pub sender_role: Option<UserRole>,
    pub receiver_role: Option<UserRole>,
}

impl MessageResponse {
    pub fn new(message: &Message, sender: &User, receiver: &User) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            order_id: message.order_id,
            item_id: message.item_id,
            text: message.text.clone(),
            is_read: message.is_read,
            created_at: message.created_at,
            sender_username: sender.username.clone(),
            receiver_username: receiver.username.clone(),
            sender_role: Some(sender.role),
            receiver_role: Some(receiver.role),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub partner_id: Uuid,
    pub partner_username: String,
    pub partner_role: UserRole,
    pub last_message: Option<MessageResponse>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageResponse>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

/// One entry in the support queue: a user with at least one unresolved
/// message in their support conversation.
#[derive(Debug, Serialize)]
pub struct SupportQueueEntry {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub last_message: Option<MessageResponse>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct SupportQueueResponse {
    pub conversations: Vec<SupportQueueEntry>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct SupportConnectResponse {
    pub support_user_id: Uuid,
    pub support_username: String,
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SupportStatusResponse {
    pub is_online: bool,
    pub online_support_count: usize,
    pub online_admin_count: usize,
    pub total_support_count: usize,
    pub total_admin_count: usize,
}

pub fn page_count(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}
