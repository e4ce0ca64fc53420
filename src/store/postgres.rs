use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Message, NewMessage, OrderParticipants, User, UserRole};
use crate::store::{MessageStore, OrderDirectory, PartnerActivity, UserDirectory};

#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, role, is_active, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn first_active_support(&self) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, role, is_active, created_at
            FROM users
            WHERE role = 'support' AND is_active = TRUE
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn active_users_with_role(&self, role: UserRole) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, role, is_active, created_at
            FROM users
            WHERE role = $1 AND is_active = TRUE
            ORDER BY created_at ASC
            "#,
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

#[derive(Clone)]
pub struct PgOrderDirectory {
    pool: PgPool,
}

impl PgOrderDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderDirectory for PgOrderDirectory {
    async fn order_participants(&self, order_id: Uuid) -> Result<Option<OrderParticipants>> {
        let buyer: Option<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((buyer_id,)) = buyer else {
            return Ok(None);
        };

        let owners: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT i.owner_id
            FROM order_items oi
            JOIN items i ON i.id = oi.item_id
            WHERE oi.order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(OrderParticipants {
            order_id,
            buyer_id,
            item_owner_ids: owners.into_iter().map(|(id,)| id).collect(),
        }))
    }
}

#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ActivityRow {
    partner_id: Uuid,
    last_message_at: DateTime<Utc>,
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(&self, msg: NewMessage) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (sender_id, receiver_id, order_id, item_id, text)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(msg.sender_id)
        .bind(msg.receiver_id)
        .bind(msg.order_id)
        .bind(msg.item_id)
        .bind(&msg.text)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn conversation_page(
        &self,
        user1: Uuid,
        user2: Uuid,
        order_id: Option<Uuid>,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<Message>, i64)> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE ((sender_id = $1 AND receiver_id = $2)
                OR (sender_id = $2 AND receiver_id = $1))
              AND ($3::uuid IS NULL OR order_id = $3)
            ORDER BY created_at DESC
            OFFSET $4 LIMIT $5
            "#,
        )
        .bind(user1)
        .bind(user2)
        .bind(order_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE ((sender_id = $1 AND receiver_id = $2)
                OR (sender_id = $2 AND receiver_id = $1))
              AND ($3::uuid IS NULL OR order_id = $3)
            "#,
        )
        .bind(user1)
        .bind(user2)
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((messages, total.0))
    }

    async fn latest_in_conversation(
        &self,
        user1: Uuid,
        user2: Uuid,
        only_unresolved: bool,
    ) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE ((sender_id = $1 AND receiver_id = $2)
                OR (sender_id = $2 AND receiver_id = $1))
              AND (NOT $3 OR is_resolved = FALSE)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user1)
        .bind(user2)
        .bind(only_unresolved)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn partner_activity(&self, user_id: Uuid) -> Result<Vec<PartnerActivity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT partner_id, MAX(created_at) AS last_message_at
            FROM (
                SELECT receiver_id AS partner_id, created_at
                FROM messages WHERE sender_id = $1
                UNION ALL
                SELECT sender_id AS partner_id, created_at
                FROM messages WHERE receiver_id = $1
            ) AS sides
            GROUP BY partner_id
            ORDER BY last_message_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| PartnerActivity {
                partner_id: r.partner_id,
                last_message_at: r.last_message_at,
            })
            .collect())
    }

    async fn unresolved_partner_activity(&self, support_id: Uuid) -> Result<Vec<PartnerActivity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT partner_id, MAX(created_at) AS last_message_at
            FROM (
                SELECT receiver_id AS partner_id, created_at
                FROM messages WHERE sender_id = $1 AND is_resolved = FALSE
                UNION ALL
                SELECT sender_id AS partner_id, created_at
                FROM messages WHERE receiver_id = $1 AND is_resolved = FALSE
            ) AS sides
            GROUP BY partner_id
            ORDER BY last_message_at DESC
            "#,
        )
        .bind(support_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| PartnerActivity {
                partner_id: r.partner_id,
                last_message_at: r.last_message_at,
            })
            .collect())
    }

    async fn unread_count(&self, user_id: Uuid, partner_id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE sender_id = $1 AND receiver_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(partner_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    async fn order_messages(&self, order_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE order_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn mark_read(&self, message_ids: &[Uuid], reader_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE
            WHERE id = ANY($1) AND receiver_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(message_ids)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn resolve_conversation(&self, user1: Uuid, user2: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_resolved = TRUE
            WHERE ((sender_id = $1 AND receiver_id = $2)
                OR (sender_id = $2 AND receiver_id = $1))
              AND is_resolved = FALSE
            "#,
        )
        .bind(user1)
        .bind(user2)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_conversation(&self, user1: Uuid, user2: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            "#,
        )
        .bind(user1)
        .bind(user2)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
