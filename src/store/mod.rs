pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Message, NewMessage, OrderParticipants, User, UserRole};

pub use postgres::{PgMessageStore, PgOrderDirectory, PgUserDirectory};

/// Last-activity marker for a conversation partner, used to build and
/// sort conversation lists.
#[derive(Debug, Clone)]
pub struct PartnerActivity {
    pub partner_id: Uuid,
    pub last_message_at: DateTime<Utc>,
}

/// Directory of marketplace users. The chat core only reads it.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// The canonical support identity: first active user with the
    /// support role. Computed fresh on every call, never cached, so a
    /// support account being deactivated takes effect immediately.
    async fn first_active_support(&self) -> Result<Option<User>>;

    async fn active_users_with_role(&self, role: UserRole) -> Result<Vec<User>>;
}

/// Directory of orders, reduced to the participants the chat layer
/// needs for access decisions.
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    async fn order_participants(&self, order_id: Uuid) -> Result<Option<OrderParticipants>>;
}

/// Durable message log. Append-only except for the read/resolved flags
/// and conversation-wide deletes.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, msg: NewMessage) -> Result<Message>;

    /// One page of the conversation between `user1` and `user2`,
    /// newest-first (callers reverse for display), plus the total count
    /// under the same filter.
    async fn conversation_page(
        &self,
        user1: Uuid,
        user2: Uuid,
        order_id: Option<Uuid>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Message>, i64)>;

    /// Most recent message between the pair; with `only_unresolved` the
    /// resolved ones are skipped (support-queue previews).
    async fn latest_in_conversation(
        &self,
        user1: Uuid,
        user2: Uuid,
        only_unresolved: bool,
    ) -> Result<Option<Message>>;

    /// Every partner `user_id` has exchanged messages with, newest
    /// activity first.
    async fn partner_activity(&self, user_id: Uuid) -> Result<Vec<PartnerActivity>>;

    /// Partners with at least one unresolved message in their
    /// conversation with `support_id`, newest activity first.
    async fn unresolved_partner_activity(&self, support_id: Uuid) -> Result<Vec<PartnerActivity>>;

    /// Messages from `partner_id` to `user_id` still unread.
    async fn unread_count(&self, user_id: Uuid, partner_id: Uuid) -> Result<i64>;

    /// All messages attached to an order, oldest-first.
    async fn order_messages(&self, order_id: Uuid) -> Result<Vec<Message>>;

    /// Flip `is_read` on the given messages, but only where
    /// `reader_id` is the receiver and the flag is still unset.
    /// Returns the number of rows actually changed.
    async fn mark_read(&self, message_ids: &[Uuid], reader_id: Uuid) -> Result<u64>;

    /// Flag every not-yet-resolved message between the pair as
    /// resolved. Returns the number of rows changed.
    async fn resolve_conversation(&self, user1: Uuid, user2: Uuid) -> Result<u64>;

    /// Permanently remove every message between the pair.
    async fn delete_conversation(&self, user1: Uuid, user2: Uuid) -> Result<u64>;
}
