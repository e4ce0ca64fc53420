use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::dto::chat_dto::{
    ConversationSummary, MessageResponse, SupportConnectResponse, SupportQueueEntry,
    SupportStatusResponse,
};
use crate::error::{Error, Result};
use crate::models::{Message, NewMessage, User, UserRole};
use crate::services::access_policy;
use crate::store::{MessageStore, OrderDirectory, UserDirectory};
use crate::websocket::{ChatEvent, ConnectionManager, MessagePush};

/// Conversation-level chat operations.
///
/// Owns the support-routing indirection (customers always talk to one
/// canonical "support" identity, whichever staff account is actually
/// acting) and the realtime dispatch: persist first, then best-effort
/// fan-out to the receiver's live sockets.
#[derive(Clone)]
pub struct ChatService {
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
    orders: Arc<dyn OrderDirectory>,
    connections: Arc<ConnectionManager>,
}

impl ChatService {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
        orders: Arc<dyn OrderDirectory>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            messages,
            users,
            orders,
            connections,
        }
    }

    /// The canonical support identity, looked up fresh on every call.
    pub async fn canonical_support(&self) -> Result<Option<User>> {
        self.users.first_active_support().await
    }

    /// Admin-to-customer messages are attributed to support so buyers
    /// never see individual admin accounts. With no active support user
    /// the message goes out under the admin's own identity; that
    /// fallback is logged, never silent.
    async fn resolve_effective_sender(&self, sender: &User, receiver: &User) -> Result<User> {
        if sender.role == UserRole::Admin && receiver.role == UserRole::User {
            match self.canonical_support().await? {
                Some(support) => return Ok(support),
                None => {
                    warn!(
                        admin_id = %sender.id,
                        receiver_id = %receiver.id,
                        "no active support user, sending under admin identity"
                    );
                }
            }
        }
        Ok(sender.clone())
    }

    /// The identity a staff viewer reads conversations under: admins
    /// transparently read the support inbox, everyone else reads their
    /// own.
    async fn effective_viewer(&self, viewer: &User) -> Result<User> {
        if viewer.role == UserRole::Admin {
            if let Some(support) = self.canonical_support().await? {
                return Ok(support);
            }
        }
        Ok(viewer.clone())
    }

    /// Persist a message and push it to the receiver's live sockets.
    ///
    /// The push is fire-and-forget: once the insert succeeded the call
    /// succeeds, an offline receiver just picks the message up on the
    /// next fetch.
    pub async fn send_message(
        &self,
        sender: &User,
        receiver_id: Uuid,
        text: String,
        order_id: Option<Uuid>,
        item_id: Option<Uuid>,
    ) -> Result<MessageResponse> {
        let receiver = self
            .users
            .user_by_id(receiver_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".into()))?;

        // Existence check only; order-thread access is enforced at read
        // time, not at send time.
        if let Some(order_id) = order_id {
            self.orders
                .order_participants(order_id)
                .await?
                .ok_or_else(|| Error::NotFound("Order not found".into()))?;
        }

        let effective_sender = self.resolve_effective_sender(sender, &receiver).await?;

        let message = self
            .messages
            .insert(NewMessage {
                sender_id: effective_sender.id,
                receiver_id: receiver.id,
                order_id,
                item_id,
                text,
            })
            .await?;

        let event = ChatEvent::NewMessage {
            message: MessagePush::from_message(&message, &effective_sender.username),
        };
        self.connections.send_to_user(&event, receiver.id);

        Ok(MessageResponse::new(&message, &effective_sender, &receiver))
    }

    /// All of `viewer`'s conversations: one entry per partner with the
    /// latest message and unread count, most recent activity first.
    pub async fn list_conversations(
        &self,
        viewer: &User,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<ConversationSummary>, i64)> {
        let activity = self.messages.partner_activity(viewer.id).await?;
        let total = activity.len() as i64;

        let skip = page_offset(page, limit) as usize;
        let mut conversations = Vec::new();
        for entry in activity.into_iter().skip(skip).take(limit as usize) {
            let Some(partner) = self.users.user_by_id(entry.partner_id).await? else {
                warn!(partner_id = %entry.partner_id, "conversation partner missing from directory");
                continue;
            };
            let last_message = self
                .messages
                .latest_in_conversation(viewer.id, partner.id, false)
                .await?;
            let unread_count = self.messages.unread_count(viewer.id, partner.id).await?;

            conversations.push(ConversationSummary {
                partner_id: partner.id,
                partner_username: partner.username.clone(),
                partner_role: partner.role,
                last_message: last_message
                    .map(|m| pair_response(&m, viewer, &partner))
                    .transpose()?,
                unread_count,
            });
        }

        Ok((conversations, total))
    }

    /// The support queue: users with at least one unresolved message in
    /// their conversation with the support identity. Staff only; an
    /// admin with no active support user gets an empty queue.
    pub async fn support_queue(
        &self,
        actor: &User,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<SupportQueueEntry>, i64)> {
        if !access_policy::can_manage_conversations(actor.role) {
            return Err(Error::Forbidden(
                "Only support staff and admins can access support conversations".into(),
            ));
        }

        let support = if actor.role == UserRole::Support {
            actor.clone()
        } else {
            match self.canonical_support().await? {
                Some(support) => support,
                None => return Ok((Vec::new(), 0)),
            }
        };

        let activity = self.messages.unresolved_partner_activity(support.id).await?;
        let total = activity.len() as i64;

        let skip = page_offset(page, limit) as usize;
        let mut entries = Vec::new();
        for entry in activity.into_iter().skip(skip).take(limit as usize) {
            let Some(user) = self.users.user_by_id(entry.partner_id).await? else {
                warn!(user_id = %entry.partner_id, "support-queue user missing from directory");
                continue;
            };
            let last_message = self
                .messages
                .latest_in_conversation(support.id, user.id, true)
                .await?;
            let unread_count = self.messages.unread_count(support.id, user.id).await?;

            entries.push(SupportQueueEntry {
                user_id: user.id,
                username: user.username.clone(),
                email: user.email.clone(),
                role: user.role,
                last_message: last_message
                    .map(|m| pair_response(&m, &support, &user))
                    .transpose()?,
                unread_count,
            });
        }

        Ok((entries, total))
    }

    /// One page of the thread between `viewer` and `partner_id`,
    /// chronological within the page. Pagination walks newest-first;
    /// the page is reversed before returning.
    pub async fn get_thread(
        &self,
        viewer: &User,
        partner_id: Uuid,
        order_id: Option<Uuid>,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<MessageResponse>, i64)> {
        let viewer = self.effective_viewer(viewer).await?;
        let skip = page_offset(page, limit);

        let (mut messages, total) = self
            .messages
            .conversation_page(viewer.id, partner_id, order_id, skip, limit)
            .await?;
        messages.reverse();

        let users = self.user_map(&messages).await?;
        let responses = messages
            .iter()
            .map(|m| mapped_response(m, &users))
            .collect::<Result<Vec<_>>>()?;

        Ok((responses, total))
    }

    /// Full order-scoped thread, oldest-first, gated by the access
    /// policy.
    pub async fn get_order_thread(
        &self,
        viewer: &User,
        order_id: Uuid,
    ) -> Result<Vec<MessageResponse>> {
        let order = self
            .orders
            .order_participants(order_id)
            .await?
            .ok_or_else(|| Error::NotFound("Order not found".into()))?;

        if !access_policy::can_view_order_thread(&order, viewer.id, viewer.role) {
            return Err(Error::Forbidden(
                "You do not have permission to view this chat".into(),
            ));
        }

        let messages = self.messages.order_messages(order_id).await?;
        let users = self.user_map(&messages).await?;
        messages
            .iter()
            .map(|m| mapped_response(m, &users))
            .collect()
    }

    /// Flip `is_read` on messages addressed to `reader_id`. Ids that
    /// are not theirs, or already read, are silently skipped; returns
    /// how many rows actually changed.
    pub async fn mark_read(&self, message_ids: &[Uuid], reader_id: Uuid) -> Result<u64> {
        self.messages.mark_read(message_ids, reader_id).await
    }

    /// Archive the conversation between the acting staff identity and
    /// `partner_id`. Data is kept, only excluded from the support
    /// queue.
    pub async fn resolve_conversation(&self, actor: &User, partner_id: Uuid) -> Result<u64> {
        let staff_id = self.conversation_staff_id(actor, "resolve").await?;
        self.messages
            .resolve_conversation(staff_id, partner_id)
            .await
    }

    /// Permanently delete the conversation between the acting staff
    /// identity and `partner_id`.
    pub async fn delete_conversation(&self, actor: &User, partner_id: Uuid) -> Result<u64> {
        let staff_id = self.conversation_staff_id(actor, "delete").await?;
        self.messages
            .delete_conversation(staff_id, partner_id)
            .await
    }

    /// Resolve which identity a staff member manages conversations as:
    /// support acts as itself, admins act as the canonical support
    /// user.
    async fn conversation_staff_id(&self, actor: &User, action: &str) -> Result<Uuid> {
        if !access_policy::can_manage_conversations(actor.role) {
            return Err(Error::Forbidden(format!(
                "Only support staff and admins can {} conversations",
                action
            )));
        }
        if actor.role == UserRole::Support {
            return Ok(actor.id);
        }
        let support = self
            .canonical_support()
            .await?
            .ok_or_else(|| Error::NotFound("No support staff available".into()))?;
        Ok(support.id)
    }

    /// Resolve the support identity a customer should open a
    /// conversation with.
    pub async fn connect_to_support(
        &self,
        order_id: Option<Uuid>,
    ) -> Result<SupportConnectResponse> {
        let support = self
            .canonical_support()
            .await?
            .ok_or_else(|| Error::NotFound("No support staff available".into()))?;

        Ok(SupportConnectResponse {
            support_user_id: support.id,
            support_username: support.username,
            order_id,
        })
    }

    /// Online/offline aggregate over active support and admin accounts.
    pub async fn support_status(&self) -> Result<SupportStatusResponse> {
        let support_users = self
            .users
            .active_users_with_role(UserRole::Support)
            .await?;
        let admin_users = self.users.active_users_with_role(UserRole::Admin).await?;

        let online_support_count = support_users
            .iter()
            .filter(|u| self.connections.is_online(u.id))
            .count();
        let online_admin_count = admin_users
            .iter()
            .filter(|u| self.connections.is_online(u.id))
            .count();

        Ok(SupportStatusResponse {
            is_online: online_support_count > 0 || online_admin_count > 0,
            online_support_count,
            online_admin_count,
            total_support_count: support_users.len(),
            total_admin_count: admin_users.len(),
        })
    }

    /// Look up every user referenced by the given messages, once each.
    async fn user_map(&self, messages: &[Message]) -> Result<HashMap<Uuid, User>> {
        let mut map = HashMap::new();
        for message in messages {
            for id in [message.sender_id, message.receiver_id] {
                if !map.contains_key(&id) {
                    if let Some(user) = self.users.user_by_id(id).await? {
                        map.insert(id, user);
                    }
                }
            }
        }
        Ok(map)
    }
}

/// Row offset for a 1-based page. Saturating so an absurd page number
/// lands past the end of the data instead of overflowing.
fn page_offset(page: i64, limit: i64) -> i64 {
    page.saturating_sub(1).saturating_mul(limit).max(0)
}

/// Build a response for a message known to be between `a` and `b`.
fn pair_response(message: &Message, a: &User, b: &User) -> Result<MessageResponse> {
    let (sender, receiver) = if message.sender_id == a.id {
        (a, b)
    } else {
        (b, a)
    };
    if message.sender_id != sender.id || message.receiver_id != receiver.id {
        return Err(Error::Internal("message outside its conversation pair".into()));
    }
    Ok(MessageResponse::new(message, sender, receiver))
}

fn mapped_response(message: &Message, users: &HashMap<Uuid, User>) -> Result<MessageResponse> {
    let sender = users
        .get(&message.sender_id)
        .ok_or_else(|| Error::Internal("message sender missing from directory".into()))?;
    let receiver = users
        .get(&message.receiver_id)
        .ok_or_else(|| Error::Internal("message receiver missing from directory".into()))?;
    Ok(MessageResponse::new(message, sender, receiver))
}
