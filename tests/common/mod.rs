#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use marketplace_backend::error::Result;
use marketplace_backend::models::{Message, NewMessage, OrderParticipants, User, UserRole};
use marketplace_backend::services::ChatService;
use marketplace_backend::store::{
    MessageStore, OrderDirectory, PartnerActivity, UserDirectory,
};
use marketplace_backend::websocket::ConnectionManager;

fn pair_matches(m: &Message, a: Uuid, b: Uuid) -> bool {
    (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a)
}

/// In-memory message log with the same flag/ordering semantics as the
/// Postgres store. Timestamps are strictly increasing so ordering
/// assertions are deterministic.
#[derive(Default)]
pub struct MemoryMessageStore {
    rows: Mutex<Vec<Message>>,
    seq: AtomicI64,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(seq)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert(&self, msg: NewMessage) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            sender_id: msg.sender_id,
            receiver_id: msg.receiver_id,
            order_id: msg.order_id,
            item_id: msg.item_id,
            text: msg.text,
            is_read: false,
            is_resolved: false,
            created_at: self.next_timestamp(),
        };
        self.rows.lock().unwrap().push(message.clone());
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
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<Message> = rows
            .iter()
            .filter(|m| pair_matches(m, user1, user2))
            .filter(|m| order_id.is_none() || m.order_id == order_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn latest_in_conversation(
        &self,
        user1: Uuid,
        user2: Uuid,
        only_unresolved: bool,
    ) -> Result<Option<Message>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| pair_matches(m, user1, user2))
            .filter(|m| !only_unresolved || !m.is_resolved)
            .max_by_key(|m| m.created_at)
            .cloned())
    }

    async fn partner_activity(&self, user_id: Uuid) -> Result<Vec<PartnerActivity>> {
        let rows = self.rows.lock().unwrap();
        let mut latest: Vec<PartnerActivity> = Vec::new();
        for m in rows.iter() {
            if m.sender_id != user_id && m.receiver_id != user_id {
                continue;
            }
            let partner_id = m.partner_of(user_id);
            match latest.iter_mut().find(|p| p.partner_id == partner_id) {
                Some(entry) => {
                    if m.created_at > entry.last_message_at {
                        entry.last_message_at = m.created_at;
                    }
                }
                None => latest.push(PartnerActivity {
                    partner_id,
                    last_message_at: m.created_at,
                }),
            }
        }
        latest.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(latest)
    }

    async fn unresolved_partner_activity(&self, support_id: Uuid) -> Result<Vec<PartnerActivity>> {
        let rows = self.rows.lock().unwrap();
        let mut latest: Vec<PartnerActivity> = Vec::new();
        for m in rows.iter() {
            if m.is_resolved || (m.sender_id != support_id && m.receiver_id != support_id) {
                continue;
            }
            let partner_id = m.partner_of(support_id);
            match latest.iter_mut().find(|p| p.partner_id == partner_id) {
                Some(entry) => {
                    if m.created_at > entry.last_message_at {
                        entry.last_message_at = m.created_at;
                    }
                }
                None => latest.push(PartnerActivity {
                    partner_id,
                    last_message_at: m.created_at,
                }),
            }
        }
        latest.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(latest)
    }

    async fn unread_count(&self, user_id: Uuid, partner_id: Uuid) -> Result<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| m.sender_id == partner_id && m.receiver_id == user_id && !m.is_read)
            .count() as i64)
    }

    async fn order_messages(&self, order_id: Uuid) -> Result<Vec<Message>> {
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<Message> = rows
            .iter()
            .filter(|m| m.order_id == Some(order_id))
            .cloned()
            .collect();
        matching.sort_by_key(|m| m.created_at);
        Ok(matching)
    }

    async fn mark_read(&self, message_ids: &[Uuid], reader_id: Uuid) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut count = 0;
        for m in rows.iter_mut() {
            if message_ids.contains(&m.id) && m.receiver_id == reader_id && !m.is_read {
                m.is_read = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn resolve_conversation(&self, user1: Uuid, user2: Uuid) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut count = 0;
        for m in rows.iter_mut() {
            if pair_matches(m, user1, user2) && !m.is_resolved {
                m.is_resolved = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_conversation(&self, user1: Uuid, user2: Uuid) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| !pair_matches(m, user1, user2));
        Ok((before - rows.len()) as u64)
    }
}

/// In-memory user directory; insertion order stands in for
/// `created_at` when picking the canonical support user.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Mutex<Vec<User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }

    pub fn deactivate(&self, id: Uuid) {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.is_active = false;
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn first_active_support(&self) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.role == UserRole::Support && u.is_active)
            .cloned())
    }

    async fn active_users_with_role(&self, role: UserRole) -> Result<Vec<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.role == role && u.is_active)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryOrderDirectory {
    orders: Mutex<Vec<OrderParticipants>>,
}

impl MemoryOrderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, order: OrderParticipants) {
        self.orders.lock().unwrap().push(order);
    }
}

#[async_trait]
impl OrderDirectory for MemoryOrderDirectory {
    async fn order_participants(&self, order_id: Uuid) -> Result<Option<OrderParticipants>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.order_id == order_id)
            .cloned())
    }
}

pub fn make_user(username: &str, role: UserRole) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        role,
        is_active: true,
        created_at: Utc::now(),
    }
}

pub struct TestEnv {
    pub chat: ChatService,
    pub messages: Arc<MemoryMessageStore>,
    pub users: Arc<MemoryUserDirectory>,
    pub orders: Arc<MemoryOrderDirectory>,
    pub connections: Arc<ConnectionManager>,
}

pub fn test_env() -> TestEnv {
    let messages = Arc::new(MemoryMessageStore::new());
    let users = Arc::new(MemoryUserDirectory::new());
    let orders = Arc::new(MemoryOrderDirectory::new());
    let connections = Arc::new(ConnectionManager::new());
    let chat = ChatService::new(
        messages.clone(),
        users.clone(),
        orders.clone(),
        connections.clone(),
    );
    TestEnv {
        chat,
        messages,
        users,
        orders,
        connections,
    }
}
